use super::{Lowerer, position};
use crate::{
    ast::{Alias, CmpOperator, Expr, Kwarg, Operator},
    builtins::{Builtin, Dunder},
    error::{LowerError, Unsupported},
    injections::Injection,
    tracer::LowerTracer,
};

impl<Tr: LowerTracer> Lowerer<'_, Tr> {
    /// `t1 = t2 = value` inside a function body.
    ///
    /// A single target binds directly. With several targets the value is evaluated once into a
    /// synthetic name and each target is assigned from it, left to right.
    pub(super) fn lower_assign(&mut self, mut targets: Vec<Expr>, value: Expr) -> Result<Expr, LowerError> {
        let value = self.lower_expr(value)?;
        if targets.len() == 1
            && let Some(target) = targets.pop()
        {
            return self.assign_to(target, value);
        }
        let temp = self.fresh_name();
        let mut exprs = Vec::with_capacity(targets.len() + 1);
        exprs.push(Expr::named(&temp, value));
        for target in targets {
            exprs.push(self.assign_to(target, Expr::name(&temp))?);
        }
        Ok(Expr::List(exprs))
    }

    /// Assigns an already lowered `value` to a target.
    pub(super) fn assign_to(&mut self, target: Expr, value: Expr) -> Result<Expr, LowerError> {
        match target {
            Expr::Name(name) => self.write_name(name, value, false),
            Expr::AttrGet { object, attr } => {
                let object = self.lower_expr(*object)?;
                Ok(self.call_builtin(Builtin::Setattr, vec![object, Expr::str(attr), value]))
            }
            Expr::Subscript { object, index } => {
                let object = self.lower_expr(*object)?;
                let index = self.lower_expr(*index)?;
                Ok(Expr::method_call(object, Dunder::SetItem.name(), vec![index, value]))
            }
            Expr::Tuple(elements) | Expr::List(elements) => {
                if elements.iter().any(|element| matches!(element, Expr::Starred(_))) {
                    return Err(Unsupported::StarredTarget.into());
                }
                // materialise once so iterators and mappings unpack like in a real assignment
                let temp = self.fresh_name();
                let mut exprs = Vec::with_capacity(elements.len() + 2);
                exprs.push(Expr::named(&temp, self.call_builtin(Builtin::Tuple, vec![value])));
                exprs.push(self.unpack_check(&temp, elements.len()));
                for (i, element) in elements.into_iter().enumerate() {
                    let item = Expr::subscript(Expr::name(&temp), position(i));
                    exprs.push(self.assign_to(element, item)?);
                }
                Ok(Expr::List(exprs))
            }
            Expr::Starred(_) => Err(Unsupported::StarredTarget.into()),
            _ => Err(Unsupported::AssignTarget.into()),
        }
    }

    /// `throw(ValueError(...)) if len(t) != n else None`, with the messages of a failed unpack.
    fn unpack_check(&mut self, temp: &str, arity: usize) -> Expr {
        let len = |this: &mut Self| this.call_builtin(Builtin::Len, vec![Expr::name(temp)]);
        let message = Expr::if_else(
            Expr::compare(len(self), CmpOperator::Gt, position(arity)),
            Expr::str(format!("too many values to unpack (expected {arity})")),
            Expr::op(
                Expr::str(format!("not enough values to unpack (expected {arity}, got %d)")),
                Operator::Mod,
                len(self),
            ),
        );
        let error = self.call_builtin(Builtin::ValueError, vec![message]);
        let throw = self.require(Injection::Throw);
        Expr::if_else(
            Expr::compare(len(self), CmpOperator::NotEq, position(arity)),
            Expr::call(throw, vec![error]),
            Expr::none(),
        )
    }

    /// Target of a module-level assignment, which stays a statement.
    pub(super) fn lower_store_target(&mut self, target: Expr) -> Result<Expr, LowerError> {
        Ok(match target {
            Expr::Name(name) => {
                self.scopes.current_mut().record_write(&name);
                Expr::Name(name)
            }
            Expr::Tuple(elements) => Expr::Tuple(self.lower_store_targets(elements)?),
            Expr::List(elements) => Expr::List(self.lower_store_targets(elements)?),
            Expr::Starred(inner) => Expr::Starred(Box::new(self.lower_store_target(*inner)?)),
            Expr::AttrGet { object, attr } => Expr::attr(self.lower_expr(*object)?, attr),
            Expr::Subscript { object, index } => {
                let object = self.lower_expr(*object)?;
                Expr::subscript(object, self.lower_expr(*index)?)
            }
            _ => return Err(Unsupported::AssignTarget.into()),
        })
    }

    fn lower_store_targets(&mut self, targets: Vec<Expr>) -> Result<Vec<Expr>, LowerError> {
        targets
            .into_iter()
            .map(|target| self.lower_store_target(target))
            .collect()
    }

    /// `target op= value` becomes a plain assignment of `target op value`.
    ///
    /// The object and index expressions of attribute and subscript targets are evaluated
    /// twice, once for the read and once for the write.
    pub(super) fn lower_aug_assign(&mut self, target: Expr, op: Operator, value: Expr) -> Result<Expr, LowerError> {
        let value = self.lower_expr(value)?;
        match target {
            Expr::Name(name) => {
                let current = self.read_name(&name);
                self.write_name(name, Expr::op(current, op, value), false)
            }
            Expr::AttrGet { object, attr } => {
                let object = self.lower_expr(*object)?;
                let current = Expr::attr(object.clone(), &attr);
                let updated = Expr::op(current, op, value);
                Ok(self.call_builtin(Builtin::Setattr, vec![object, Expr::str(attr), updated]))
            }
            Expr::Subscript { object, index } => {
                let object = self.lower_expr(*object)?;
                let index = self.lower_expr(*index)?;
                let current = Expr::subscript(object.clone(), index.clone());
                Ok(Expr::method_call(
                    object,
                    Dunder::SetItem.name(),
                    vec![index, Expr::op(current, op, value)],
                ))
            }
            _ => Err(Unsupported::AssignTarget.into()),
        }
    }

    /// `import a.b.c` binds `a` to the top-level package returned by `__import__`.
    /// `import a.b.c as d` walks down to the submodule with `getattr` and binds that.
    pub(super) fn lower_import(&mut self, names: Vec<Alias>) -> Result<Expr, LowerError> {
        let mut exprs = Vec::with_capacity(names.len());
        for Alias { name, asname } in names {
            let load = self.call_builtin(Builtin::Import, vec![Expr::str(&name)]);
            let mut parts = name.split('.');
            let head = parts.next().unwrap_or_default().to_owned();
            let (bound, value) = match asname {
                Some(asname) => (
                    asname,
                    parts.fold(load, |module, part| {
                        self.call_builtin(Builtin::Getattr, vec![module, Expr::str(part)])
                    }),
                ),
                None => (head, load),
            };
            exprs.push(self.write_name(bound, value, false)?);
        }
        Ok(Expr::last_of(exprs))
    }

    /// `from m import a, b as c` loads `m` once and reads each name off it.
    pub(super) fn lower_import_from(
        &mut self,
        module: Option<String>,
        names: Vec<Alias>,
        level: u32,
    ) -> Result<Expr, LowerError> {
        let Some(module) = module.filter(|_| level == 0) else {
            return Err(Unsupported::RelativeImport.into());
        };
        if names.iter().any(|alias| alias.name == "*") {
            return Err(Unsupported::StarImport.into());
        }
        let fromlist = Expr::Tuple(names.iter().map(|alias| Expr::str(&alias.name)).collect());
        let load = Expr::Call {
            callable: Box::new(self.builtin(Builtin::Import)),
            args: vec![Expr::str(module)],
            kwargs: vec![Kwarg {
                name: Some("fromlist".to_owned()),
                value: fromlist,
            }],
        };

        let mut exprs = Vec::with_capacity(names.len() + 1);
        let source = if names.len() == 1 {
            load
        } else {
            let temp = self.fresh_name();
            exprs.push(Expr::named(&temp, load));
            Expr::name(temp)
        };
        for Alias { name, asname } in names {
            let value = self.call_builtin(Builtin::Getattr, vec![source.clone(), Expr::str(&name)]);
            exprs.push(self.write_name(asname.unwrap_or(name), value, false)?);
        }
        Ok(Expr::last_of(exprs))
    }
}
