use super::Lowerer;
use crate::{
    ast::{ClassDef, DictItem, Expr, FunctionDef, Literal, Node, Param, Parameters},
    builtins::{Builtin, Dunder},
    error::{LowerError, Unsupported},
    tracer::LowerTracer,
};

impl<Tr: LowerTracer> Lowerer<'_, Tr> {
    /// Lowers a `def` to a decorated lambda; binding the name is left to the caller.
    ///
    /// Annotations are dropped. Defaults and decorators are evaluated in the enclosing scope.
    pub(super) fn lower_function(&mut self, def: FunctionDef) -> Result<Expr, LowerError> {
        let FunctionDef {
            params,
            body,
            decorators,
            is_async,
            ..
        } = def;
        if is_async {
            return Err(Unsupported::Async.into());
        }
        let decorators = self.lower_exprs(decorators)?;
        let params = self.lower_params(params)?;
        self.push_scope(params.iter().map(|param| param.name.clone()).collect());
        let body = self.lower_body(body, true)?;
        self.pop_scope();
        Ok(apply_decorators(decorators, Expr::lambda(params, body)))
    }

    pub(super) fn lower_params(&mut self, params: Parameters) -> Result<Parameters, LowerError> {
        let Parameters {
            posonly,
            args,
            vararg,
            kwonly,
            kwarg,
        } = params;
        Ok(Parameters {
            posonly: self.lower_param_list(posonly)?,
            args: self.lower_param_list(args)?,
            vararg: vararg.map(|param| Param::new(param.name)),
            kwonly: self.lower_param_list(kwonly)?,
            kwarg: kwarg.map(|param| Param::new(param.name)),
        })
    }

    fn lower_param_list(&mut self, params: Vec<Param>) -> Result<Vec<Param>, LowerError> {
        params
            .into_iter()
            .map(|param| {
                Ok(Param {
                    name: param.name,
                    default: param.default.map(|default| self.lower_expr(default)).transpose()?,
                    annotation: None,
                })
            })
            .collect()
    }

    /// `(Name := type('Name', (), {member: value, ...}))`
    ///
    /// Methods become plain lambdas in the member table. Declared bases are only passed on
    /// when [`LowerOptions::keep_class_bases`](crate::LowerOptions) is set.
    pub(super) fn lower_class(&mut self, def: ClassDef) -> Result<Expr, LowerError> {
        let ClassDef {
            name,
            bases,
            keywords,
            body,
            decorators,
        } = def;
        let decorators = self.lower_exprs(decorators)?;

        let mut metaclass = None;
        let mut lowered_bases = Vec::new();
        if self.options.keep_class_bases {
            for keyword in keywords {
                if keyword.name.as_deref() != Some("metaclass") {
                    return Err(Unsupported::ClassKeyword.into());
                }
                metaclass = Some(self.lower_expr(keyword.value)?);
            }
            lowered_bases = self.lower_exprs(bases)?;
        }

        // entries stay in body order; a repeated member keeps its first position and last value
        let mut table = Vec::new();
        for (i, node) in body.into_iter().enumerate() {
            match node {
                Node::Expr(Expr::Literal(Literal::Str(doc))) if i == 0 => {
                    table.push(member(Dunder::Doc.name(), Expr::str(doc)));
                }
                Node::FunctionDef(method) => {
                    let method_name = method.name.clone();
                    let value = self.lower_function(method)?;
                    table.push(member(method_name, value));
                }
                Node::Assign { targets, value } => {
                    let value = self.lower_expr(value)?;
                    let mut names = Vec::with_capacity(targets.len());
                    for target in targets {
                        let Expr::Name(name) = target else {
                            return Err(Unsupported::ClassBody.into());
                        };
                        names.push(name);
                    }
                    // `a = b = v` evaluates `v` once: `{'a': (t := v), 'b': t}`
                    let temp = if names.len() > 1 { Some(self.fresh_name()) } else { None };
                    let mut first = Some(match &temp {
                        Some(temp) => Expr::named(temp, value),
                        None => value,
                    });
                    for name in names {
                        if let Some(entry) = first.take().or_else(|| temp.as_ref().map(Expr::name)) {
                            table.push(member(name, entry));
                        }
                    }
                }
                Node::AnnAssign {
                    target: Expr::Name(name),
                    value,
                    ..
                } => {
                    if let Some(value) = value {
                        let value = self.lower_expr(value)?;
                        table.push(member(name, value));
                    }
                }
                _ => return Err(Unsupported::ClassBody.into()),
            }
        }
        let constructor = match metaclass {
            Some(metaclass) => metaclass,
            None => self.builtin(Builtin::Type),
        };
        let class = Expr::call(
            constructor,
            vec![Expr::str(&name), Expr::Tuple(lowered_bases), Expr::Dict(table)],
        );
        let class = apply_decorators(decorators, class);
        self.write_name(name, class, false)
    }
}

fn member(name: impl Into<String>, value: Expr) -> DictItem {
    DictItem::Pair {
        key: Expr::str(name),
        value,
    }
}

/// Applies decorators innermost (last listed) first.
fn apply_decorators(decorators: Vec<Expr>, value: Expr) -> Expr {
    decorators
        .into_iter()
        .rev()
        .fold(value, |value, decorator| Expr::call(decorator, vec![value]))
}
