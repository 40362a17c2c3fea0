//! Statement lowering engine.
//!
//! [`Lowerer`] walks the input tree once, top-down, and rebuilds every statement as an
//! expression. The rules are split by topic:
//!
//! - `bindings`: assignments, augmented assignments and imports
//! - `control`: `if`, `while`, `for` and `with`
//! - `defs`: functions and classes
//! - `exceptions`: `raise` and `try`, including the shadow-dictionary conversion
//! - `expr`: expressions, which mostly copy through with name reads rewritten
//!
//! Bodies are sequenced as `[s1, s2, ..., sN][-1]`, so every statement runs left to right
//! for its side effects and the last one provides the value.

mod bindings;
mod control;
mod defs;
mod exceptions;
mod expr;

use crate::{
    ast::{CmpOperator, Expr, Module, Node, TopLevel},
    builtins::{Builtin, Dunder},
    error::{LowerError, Unsupported},
    injections::{Injection, InjectionSet},
    names::NameGenerator,
    options::LowerOptions,
    scope::{Resolution, ScopeStack, WriteTarget},
    tracer::LowerTracer,
};

/// Output of one lowering pass, before support definitions are added.
#[derive(Debug)]
pub(crate) struct LoweredModule {
    pub body: Vec<TopLevel>,
    pub injections: InjectionSet,
    /// Some item refers to the builtins alias.
    pub uses_builtins: bool,
}

/// State of one lowering pass.
///
/// Scopes and injection tags belong to the pass; the name generator is shared with the
/// caller so names stay unique across passes.
pub(crate) struct Lowerer<'c, Tr: LowerTracer> {
    names: &'c NameGenerator,
    options: &'c LowerOptions,
    tracer: &'c mut Tr,
    scopes: ScopeStack,
    injections: InjectionSet,
    uses_builtins: bool,
    /// Current statement/expression nesting.
    depth: usize,
}

impl<'c, Tr: LowerTracer> Lowerer<'c, Tr> {
    pub fn new(names: &'c NameGenerator, options: &'c LowerOptions, tracer: &'c mut Tr) -> Self {
        Self {
            names,
            options,
            tracer,
            scopes: ScopeStack::new(),
            injections: InjectionSet::new(),
            uses_builtins: false,
            depth: 0,
        }
    }

    /// Lowers a whole module, returning its items and the support constructs they use.
    pub fn lower_module(mut self, module: Module) -> Result<LoweredModule, LowerError> {
        let mut body = Vec::with_capacity(module.body.len());
        for node in module.body {
            if let Some(item) = self.lower_top_level(node)? {
                body.push(item);
            }
        }
        Ok(LoweredModule {
            body,
            injections: self.injections,
            uses_builtins: self.uses_builtins,
        })
    }

    /// Module-level statements: assignments and function definitions stay statements so
    /// later items can refer to the names they bind.
    fn lower_top_level(&mut self, node: Node) -> Result<Option<TopLevel>, LowerError> {
        match node {
            Node::Assign { targets, value } => {
                self.tracer.on_statement("assign", 0);
                let value = self.lower_expr(value)?;
                let targets = targets
                    .into_iter()
                    .map(|target| self.lower_store_target(target))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(TopLevel::Assign { targets, value }))
            }
            Node::AnnAssign {
                target,
                value: Some(value),
                ..
            } => {
                self.tracer.on_statement("ann_assign", 0);
                let value = self.lower_expr(value)?;
                let target = self.lower_store_target(target)?;
                Ok(Some(TopLevel::Assign {
                    targets: vec![target],
                    value,
                }))
            }
            Node::FunctionDef(def) => {
                self.tracer.on_statement("function_def", 0);
                let name = def.name.clone();
                let value = self.lower_function(def)?;
                self.scopes.current_mut().record_write(&name);
                Ok(Some(TopLevel::Assign {
                    targets: vec![Expr::Name(name)],
                    value,
                }))
            }
            node => Ok(self.lower_node(node, false)?.map(TopLevel::Expr)),
        }
    }

    /// Lowers one statement. `None` means the statement has no runtime effect.
    ///
    /// `tail` marks the last statement of a function body (directly or through branches),
    /// whose value becomes the function's return value.
    fn lower_node(&mut self, node: Node, tail: bool) -> Result<Option<Expr>, LowerError> {
        self.enter()?;
        self.tracer.on_statement(node.kind(), self.scopes.depth());
        let result = self.lower_node_inner(node, tail);
        self.leave();
        result
    }

    fn lower_node_inner(&mut self, node: Node, tail: bool) -> Result<Option<Expr>, LowerError> {
        let expr = match node {
            Node::Expr(expr) => self.lower_expr(expr)?,
            Node::Return(Some(value)) => self.lower_expr(value)?,
            Node::Return(None) => Expr::none(),
            Node::Assign { targets, value } => self.lower_assign(targets, value)?,
            Node::AnnAssign {
                target,
                value: Some(value),
                ..
            } => self.lower_assign(vec![target], value)?,
            Node::AnnAssign { value: None, .. } => return Ok(None),
            Node::AugAssign { target, op, value } => self.lower_aug_assign(target, op, value)?,
            Node::If { test, body, or_else } => self.lower_if(test, body, or_else, tail)?,
            Node::While { test, body, or_else } => self.lower_while(test, body, or_else)?,
            Node::For { is_async: true, .. } | Node::With { is_async: true, .. } => {
                return Err(Unsupported::Async.into());
            }
            Node::For {
                target,
                iter,
                body,
                or_else,
                ..
            } => self.lower_for(target, iter, body, or_else)?,
            Node::With { items, body, .. } => self.lower_with(items, body, tail)?,
            Node::Try(node) => self.lower_try(node, tail)?,
            Node::Raise { exc, cause } => self.lower_raise(exc, cause)?,
            Node::FunctionDef(def) => {
                let name = def.name.clone();
                let value = self.lower_function(def)?;
                self.write_name(name, value, false)?
            }
            Node::ClassDef(def) => self.lower_class(def)?,
            Node::Import { names } => self.lower_import(names)?,
            Node::ImportFrom { module, names, level } => self.lower_import_from(module, names, level)?,
            Node::Pass => return Err(Unsupported::Pass.into()),
            Node::Break => return Err(Unsupported::Break.into()),
            Node::Continue => return Err(Unsupported::Continue.into()),
            Node::Delete { .. } => return Err(Unsupported::Delete.into()),
            Node::Global { .. } => return Err(Unsupported::Global.into()),
            Node::Nonlocal { .. } => return Err(Unsupported::Nonlocal.into()),
        };
        Ok(Some(expr))
    }

    /// Sequences a statement body into one expression.
    ///
    /// In tail position a trailing `None` is added unless the last statement already
    /// produces the function's value, so falling off the end returns `None`.
    fn lower_body(&mut self, body: Vec<Node>, tail: bool) -> Result<Expr, LowerError> {
        let needs_none = tail && !body.last().is_some_and(completes_tail);
        let last = body.len().saturating_sub(1);
        let mut exprs = Vec::with_capacity(body.len() + 1);
        for (i, node) in body.into_iter().enumerate() {
            if let Some(expr) = self.lower_node(node, tail && i == last)? {
                exprs.push(expr);
            }
        }
        if needs_none {
            exprs.push(Expr::none());
        }
        Ok(Expr::last_of(exprs))
    }

    fn fresh_name(&mut self) -> String {
        let name = self.names.next_unique_name();
        self.tracer.on_synthetic_name(&name);
        name
    }

    /// Marks a support construct, and the ones it calls, as needed and returns a reference
    /// to it.
    fn require(&mut self, injection: Injection) -> Expr {
        for &called in injection.requires() {
            self.require(called);
        }
        if self.injections.insert(injection) {
            self.tracer.on_injection(injection);
        }
        Expr::name(injection.helper_name(self.names))
    }

    /// `builtins.name`, through the alias defined ahead of the program.
    fn builtin(&mut self, builtin: Builtin) -> Expr {
        self.uses_builtins = true;
        builtin.expr(self.names)
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Expr>) -> Expr {
        Expr::call(self.builtin(builtin), args)
    }

    /// A name that may be missing from the shadow dictionary reads as
    /// `dict['x'] if 'x' in dict else x`, falling back to the binding made before the `try`.
    fn read_name(&self, name: &str) -> Expr {
        match self.scopes.resolve_read(name) {
            Resolution::Shadow(dict) => shadow_lookup(dict, name),
            Resolution::MaybeShadow(dict) => Expr::if_else(
                Expr::compare(Expr::str(name), CmpOperator::In, Expr::name(dict)),
                shadow_lookup(dict, name),
                Expr::name(name),
            ),
            Resolution::Direct | Resolution::Unknown => Expr::name(name),
        }
    }

    /// Stores `value` under `name` in the current scope.
    ///
    /// Inside a `try` this becomes `dict.__setitem__(name, value)`; when `keep_value` is set
    /// the stored value is read back so the write can be used as an expression.
    fn write_name(&mut self, name: String, value: Expr, keep_value: bool) -> Result<Expr, LowerError> {
        let scope = self.scopes.current_mut();
        if scope.is_masked(&name) {
            return Err(Unsupported::LoopTargetRebound.into());
        }
        Ok(match scope.record_write(&name) {
            WriteTarget::Direct => Expr::named(name, value),
            WriteTarget::Shadow(dict) => {
                let store = shadow_store(&dict, &name, value);
                if keep_value {
                    Expr::last_of(vec![store, shadow_lookup(&dict, &name)])
                } else {
                    store
                }
            }
        })
    }

    fn push_scope(&mut self, params: Vec<String>) {
        self.scopes.push_function(params);
        self.tracer.on_scope_push(self.scopes.depth());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop_function();
        self.tracer.on_scope_pop(self.scopes.depth());
    }

    fn enter(&mut self) -> Result<(), LowerError> {
        if let Some(limit) = self.options.max_nesting_depth
            && self.depth >= limit
        {
            return Err(LowerError::NestingTooDeep { limit });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Statements that provide a value on every path in tail position.
fn completes_tail(node: &Node) -> bool {
    matches!(
        node,
        Node::Return(_) | Node::Raise { .. } | Node::If { .. } | Node::Try(_) | Node::With { is_async: false, .. }
    )
}

/// `dict['name']`
fn shadow_lookup(dict: &str, name: &str) -> Expr {
    Expr::subscript(Expr::name(dict), Expr::str(name))
}

/// `dict.__setitem__('name', value)`
fn shadow_store(dict: &str, name: &str, value: Expr) -> Expr {
    Expr::method_call(Expr::name(dict), Dunder::SetItem.name(), vec![Expr::str(name), value])
}

/// Literal index for position `i` of an unpacked sequence.
fn position(i: usize) -> Expr {
    Expr::int(i64::try_from(i).unwrap_or(i64::MAX))
}
