//! Synthetic identifiers and the reserved-prefix check on user identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    ast::{Comprehension, DictItem, Expr, Module, Node, Parameters},
    error::LowerError,
};

/// Prefix used when no other is configured.
pub const DEFAULT_PREFIX: &str = "__exprify_";

/// Produces identifiers for intermediate bindings.
///
/// Names are `{prefix}{n}` with `n` counting up from 1 and never reused for the lifetime of
/// the generator. The counter is atomic, so one generator can be shared (via `Arc`) by
/// compilers running on different threads without handing out duplicates.
///
/// User identifiers starting with the prefix are rejected by the compiler, which keeps
/// generated names disjoint from user names.
#[derive(Debug)]
pub struct NameGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }
}

impl NameGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator with a custom reserved prefix.
    ///
    /// The prefix must itself be a valid identifier.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(1),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns a name that has never been returned before by this generator.
    pub fn next_unique_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{n}", self.prefix)
    }

    /// Fixed name under the reserved prefix, used for injected helpers.
    ///
    /// These never clash with [`next_unique_name`](Self::next_unique_name) results since
    /// `suffix` is not numeric.
    pub(crate) fn reserved(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.prefix)
    }

    /// Fails if any identifier written in `module` starts with the reserved prefix.
    pub(crate) fn check_module(&self, module: &Module) -> Result<(), LowerError> {
        let mut checker = ReservedCheck {
            prefix: &self.prefix,
            offender: None,
        };
        checker.nodes(&module.body);
        match checker.offender {
            Some(name) => Err(LowerError::ReservedIdentifier {
                name,
                prefix: self.prefix.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Walks the input tree looking for the first identifier under the reserved prefix.
struct ReservedCheck<'a> {
    prefix: &'a str,
    offender: Option<String>,
}

impl ReservedCheck<'_> {
    fn ident(&mut self, name: &str) {
        if self.offender.is_none() && name.starts_with(self.prefix) {
            self.offender = Some(name.to_owned());
        }
    }

    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            if self.offender.is_some() {
                return;
            }
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Expr(expr) | Node::Return(Some(expr)) => self.expr(expr),
            Node::Return(None) | Node::Pass | Node::Break | Node::Continue => {}
            Node::Assign { targets, value } => {
                self.exprs(targets);
                self.expr(value);
            }
            Node::AnnAssign {
                target,
                annotation,
                value,
            } => {
                self.expr(target);
                self.expr(annotation);
                self.opt_expr(value.as_ref());
            }
            Node::AugAssign { target, value, .. } => {
                self.expr(target);
                self.expr(value);
            }
            Node::If { test, body, or_else } | Node::While { test, body, or_else } => {
                self.expr(test);
                self.nodes(body);
                self.nodes(or_else);
            }
            Node::For {
                target,
                iter,
                body,
                or_else,
                ..
            } => {
                self.expr(target);
                self.expr(iter);
                self.nodes(body);
                self.nodes(or_else);
            }
            Node::With { items, body, .. } => {
                for item in items {
                    self.expr(&item.context_expr);
                    self.opt_expr(item.optional_vars.as_ref());
                }
                self.nodes(body);
            }
            Node::Try(t) => {
                self.nodes(&t.body);
                for handler in &t.handlers {
                    self.opt_expr(handler.exc_type.as_ref());
                    if let Some(name) = &handler.name {
                        self.ident(name);
                    }
                    self.nodes(&handler.body);
                }
                self.nodes(&t.or_else);
                self.nodes(&t.finally);
            }
            Node::Raise { exc, cause } => {
                self.opt_expr(exc.as_ref());
                self.opt_expr(cause.as_ref());
            }
            Node::FunctionDef(def) => {
                self.ident(&def.name);
                self.params(&def.params);
                self.exprs(&def.decorators);
                self.opt_expr(def.returns.as_ref());
                self.nodes(&def.body);
            }
            Node::ClassDef(def) => {
                self.ident(&def.name);
                self.exprs(&def.bases);
                for kwarg in &def.keywords {
                    self.expr(&kwarg.value);
                }
                self.exprs(&def.decorators);
                self.nodes(&def.body);
            }
            Node::Import { names } | Node::ImportFrom { names, .. } => {
                for alias in names {
                    // only the bound name matters; dotted module paths are never bound whole
                    match &alias.asname {
                        Some(asname) => self.ident(asname),
                        None => self.ident(alias.name.split('.').next().unwrap_or_default()),
                    }
                }
            }
            Node::Delete { targets } => self.exprs(targets),
            Node::Global { names } | Node::Nonlocal { names } => {
                for name in names {
                    self.ident(name);
                }
            }
        }
    }

    fn params(&mut self, params: &Parameters) {
        for param in params.iter() {
            self.ident(&param.name);
            self.opt_expr(param.default.as_ref());
            self.opt_expr(param.annotation.as_ref());
        }
    }

    fn opt_expr(&mut self, expr: Option<&Expr>) {
        if let Some(expr) = expr {
            self.expr(expr);
        }
    }

    fn exprs(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.expr(expr);
        }
    }

    fn generators(&mut self, generators: &[Comprehension]) {
        for generator in generators {
            self.expr(&generator.target);
            self.expr(&generator.iter);
            self.exprs(&generator.ifs);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Name(name) => self.ident(name),
            Expr::Call { callable, args, kwargs } => {
                self.expr(callable);
                self.exprs(args);
                for kwarg in kwargs {
                    if let Some(name) = &kwarg.name {
                        self.ident(name);
                    }
                    self.expr(&kwarg.value);
                }
            }
            Expr::AttrGet { object, .. } => self.expr(object),
            Expr::Op { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::BoolOp { values, .. } => self.exprs(values),
            Expr::Compare { left, comparisons } => {
                self.expr(left);
                for (_, right) in comparisons {
                    self.expr(right);
                }
            }
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Lambda { params, body } => {
                self.params(params);
                self.expr(body);
            }
            Expr::IfElse { test, body, orelse } => {
                self.expr(test);
                self.expr(body);
                self.expr(orelse);
            }
            Expr::ListComp { elt, generators }
            | Expr::SetComp { elt, generators }
            | Expr::GeneratorExp { elt, generators } => {
                self.generators(generators);
                self.expr(elt);
            }
            Expr::DictComp { key, value, generators } => {
                self.generators(generators);
                self.expr(key);
                self.expr(value);
            }
            Expr::List(elements) | Expr::Tuple(elements) | Expr::Set(elements) => self.exprs(elements),
            Expr::Dict(items) => {
                for item in items {
                    match item {
                        DictItem::Pair { key, value } => {
                            self.expr(key);
                            self.expr(value);
                        }
                        DictItem::Unpack { mapping } => self.expr(mapping),
                    }
                }
            }
            Expr::Subscript { object, index } => {
                self.expr(object);
                self.expr(index);
            }
            Expr::Slice { lower, upper, step } => {
                for part in [lower, upper, step].into_iter().flatten() {
                    self.expr(part);
                }
            }
            Expr::Named { target, value } => {
                self.ident(target);
                self.expr(value);
            }
            Expr::Starred(value) | Expr::Await(value) | Expr::YieldFrom { value } => self.expr(value),
            Expr::Yield { value } => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
        }
    }
}
