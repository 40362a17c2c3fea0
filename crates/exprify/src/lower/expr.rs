use super::{Lowerer, control::target_names};
use crate::{
    ast::{Comprehension, DictItem, Expr, Kwarg},
    error::{LowerError, Unsupported},
    tracer::LowerTracer,
};

impl<Tr: LowerTracer> Lowerer<'_, Tr> {
    /// Rebuilds an expression with name reads and walrus writes redirected where needed.
    pub(super) fn lower_expr(&mut self, expr: Expr) -> Result<Expr, LowerError> {
        self.enter()?;
        let result = self.lower_expr_inner(expr);
        self.leave();
        result
    }

    pub(super) fn lower_exprs(&mut self, exprs: Vec<Expr>) -> Result<Vec<Expr>, LowerError> {
        exprs.into_iter().map(|expr| self.lower_expr(expr)).collect()
    }

    fn lower_boxed(&mut self, expr: Box<Expr>) -> Result<Box<Expr>, LowerError> {
        self.lower_expr(*expr).map(Box::new)
    }

    fn lower_expr_inner(&mut self, expr: Expr) -> Result<Expr, LowerError> {
        Ok(match expr {
            Expr::Literal(_) => expr,
            Expr::Name(name) => self.read_name(&name),
            Expr::Call { callable, args, kwargs } => Expr::Call {
                callable: self.lower_boxed(callable)?,
                args: self.lower_exprs(args)?,
                kwargs: kwargs
                    .into_iter()
                    .map(|Kwarg { name, value }| {
                        Ok(Kwarg {
                            name,
                            value: self.lower_expr(value)?,
                        })
                    })
                    .collect::<Result<_, LowerError>>()?,
            },
            Expr::AttrGet { object, attr } => Expr::AttrGet {
                object: self.lower_boxed(object)?,
                attr,
            },
            Expr::Op { left, op, right } => Expr::Op {
                left: self.lower_boxed(left)?,
                op,
                right: self.lower_boxed(right)?,
            },
            Expr::BoolOp { op, values } => {
                // every operand after the first may be skipped
                let mut lowered = Vec::with_capacity(values.len());
                let mut values = values.into_iter();
                if let Some(first) = values.next() {
                    lowered.push(self.lower_expr(first)?);
                }
                self.scopes.current_mut().enter_branch();
                let rest = self.lower_exprs(values.collect());
                self.scopes.current_mut().exit_branch();
                lowered.extend(rest?);
                Expr::BoolOp { op, values: lowered }
            }
            Expr::Compare { left, comparisons } => Expr::Compare {
                left: self.lower_boxed(left)?,
                comparisons: comparisons
                    .into_iter()
                    .map(|(op, right)| Ok((op, self.lower_expr(right)?)))
                    .collect::<Result<_, LowerError>>()?,
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op,
                operand: self.lower_boxed(operand)?,
            },
            Expr::Lambda { params, body } => {
                let params = self.lower_params(*params)?;
                self.push_scope(params.iter().map(|param| param.name.clone()).collect());
                let body = self.lower_expr(*body);
                self.pop_scope();
                Expr::lambda(params, body?)
            }
            Expr::IfElse { test, body, orelse } => {
                let test = self.lower_expr(*test)?;
                self.scopes.current_mut().enter_branch();
                let arms = self
                    .lower_expr(*body)
                    .and_then(|body| Ok((body, self.lower_expr(*orelse)?)));
                self.scopes.current_mut().exit_branch();
                let (body, orelse) = arms?;
                Expr::if_else(test, body, orelse)
            }
            Expr::ListComp { elt, generators } => {
                let (generators, elt) = self.lower_comprehension(generators, |this| this.lower_boxed(elt))?;
                Expr::ListComp { elt, generators }
            }
            Expr::SetComp { elt, generators } => {
                let (generators, elt) = self.lower_comprehension(generators, |this| this.lower_boxed(elt))?;
                Expr::SetComp { elt, generators }
            }
            Expr::GeneratorExp { elt, generators } => {
                let (generators, elt) = self.lower_comprehension(generators, |this| this.lower_boxed(elt))?;
                Expr::GeneratorExp { elt, generators }
            }
            Expr::DictComp { key, value, generators } => {
                let (generators, (key, value)) = self.lower_comprehension(generators, |this| {
                    Ok((this.lower_boxed(key)?, this.lower_boxed(value)?))
                })?;
                Expr::DictComp { key, value, generators }
            }
            Expr::List(elements) => Expr::List(self.lower_exprs(elements)?),
            Expr::Tuple(elements) => Expr::Tuple(self.lower_exprs(elements)?),
            Expr::Set(elements) => Expr::Set(self.lower_exprs(elements)?),
            Expr::Dict(items) => Expr::Dict(
                items
                    .into_iter()
                    .map(|item| {
                        Ok(match item {
                            DictItem::Pair { key, value } => DictItem::Pair {
                                key: self.lower_expr(key)?,
                                value: self.lower_expr(value)?,
                            },
                            DictItem::Unpack { mapping } => DictItem::Unpack {
                                mapping: self.lower_expr(mapping)?,
                            },
                        })
                    })
                    .collect::<Result<_, LowerError>>()?,
            ),
            Expr::Subscript { object, index } => Expr::Subscript {
                object: self.lower_boxed(object)?,
                index: self.lower_boxed(index)?,
            },
            Expr::Slice { lower, upper, step } => Expr::Slice {
                lower: lower.map(|bound| self.lower_boxed(bound)).transpose()?,
                upper: upper.map(|bound| self.lower_boxed(bound)).transpose()?,
                step: step.map(|bound| self.lower_boxed(bound)).transpose()?,
            },
            Expr::Named { target, value } => {
                let value = self.lower_expr(*value)?;
                self.write_name(target, value, true)?
            }
            Expr::Starred(value) => Expr::Starred(self.lower_boxed(value)?),
            Expr::Await(_) => return Err(Unsupported::Await.into()),
            Expr::Yield { .. } => return Err(Unsupported::Yield.into()),
            Expr::YieldFrom { .. } => return Err(Unsupported::YieldFrom.into()),
        })
    }

    /// Lowers comprehension clauses, then `element` with every clause target in effect.
    ///
    /// The first iterable is evaluated in the enclosing scope. Everything after it may run
    /// any number of times, including zero.
    fn lower_comprehension<T>(
        &mut self,
        generators: Vec<Comprehension>,
        element: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<(Vec<Comprehension>, T), LowerError> {
        let mut masked = 0;
        let mut branched = false;
        let result = self
            .lower_generators(generators, &mut masked, &mut branched)
            .and_then(|generators| Ok((generators, element(self)?)));
        let scope = self.scopes.current_mut();
        scope.unmask(masked);
        if branched {
            scope.exit_branch();
        }
        result
    }

    fn lower_generators(
        &mut self,
        generators: Vec<Comprehension>,
        masked: &mut usize,
        branched: &mut bool,
    ) -> Result<Vec<Comprehension>, LowerError> {
        let mut lowered = Vec::with_capacity(generators.len());
        for Comprehension {
            target,
            iter,
            ifs,
            is_async,
        } in generators
        {
            if is_async {
                return Err(Unsupported::Async.into());
            }
            let iter = self.lower_expr(iter)?;
            if !*branched {
                self.scopes.current_mut().enter_branch();
                *branched = true;
            }
            let mut names = Vec::new();
            target_names(&target, &mut names)?;
            *masked += self.scopes.current_mut().mask(names);
            let ifs = self.lower_exprs(ifs)?;
            lowered.push(Comprehension {
                target,
                iter,
                ifs,
                is_async,
            });
        }
        Ok(lowered)
    }
}

/// Whether evaluating `expr` binds a name in the scope it appears in.
///
/// Python rejects such expressions as the iterable of a comprehension.
pub(super) fn binds_in_place(expr: &Expr) -> bool {
    match expr {
        Expr::Named { .. } => true,
        Expr::Literal(_) | Expr::Name(_) | Expr::Lambda { .. } => false,
        Expr::Call { callable, args, kwargs } => {
            binds_in_place(callable)
                || args.iter().any(binds_in_place)
                || kwargs.iter().any(|kwarg| binds_in_place(&kwarg.value))
        }
        Expr::AttrGet { object: value, .. }
        | Expr::Unary { operand: value, .. }
        | Expr::Starred(value)
        | Expr::Await(value)
        | Expr::YieldFrom { value } => binds_in_place(value),
        Expr::Op { left, right, .. } => binds_in_place(left) || binds_in_place(right),
        Expr::BoolOp { values, .. } | Expr::List(values) | Expr::Tuple(values) | Expr::Set(values) => {
            values.iter().any(binds_in_place)
        }
        Expr::Compare { left, comparisons } => {
            binds_in_place(left) || comparisons.iter().any(|(_, right)| binds_in_place(right))
        }
        Expr::IfElse { test, body, orelse } => binds_in_place(test) || binds_in_place(body) || binds_in_place(orelse),
        Expr::ListComp { elt, generators } | Expr::SetComp { elt, generators } | Expr::GeneratorExp { elt, generators } => {
            binds_in_place(elt) || generators_bind(generators)
        }
        Expr::DictComp { key, value, generators } => {
            binds_in_place(key) || binds_in_place(value) || generators_bind(generators)
        }
        Expr::Dict(items) => items.iter().any(|item| match item {
            DictItem::Pair { key, value } => binds_in_place(key) || binds_in_place(value),
            DictItem::Unpack { mapping } => binds_in_place(mapping),
        }),
        Expr::Subscript { object, index } => binds_in_place(object) || binds_in_place(index),
        Expr::Slice { lower, upper, step } => [lower, upper, step]
            .into_iter()
            .any(|bound| bound.as_deref().is_some_and(binds_in_place)),
        Expr::Yield { value } => value.as_deref().is_some_and(binds_in_place),
    }
}

fn generators_bind(generators: &[Comprehension]) -> bool {
    generators
        .iter()
        .any(|generator| binds_in_place(&generator.iter) || generator.ifs.iter().any(binds_in_place))
}
