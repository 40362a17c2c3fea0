use super::{Lowerer, expr::binds_in_place};
use crate::{
    ast::{Comprehension, Expr, Node, WithItem},
    builtins::{Builtin, Dunder},
    error::{LowerError, Unsupported},
    tracer::LowerTracer,
};

impl<Tr: LowerTracer> Lowerer<'_, Tr> {
    /// `body if test else or_else`; an empty `else` yields `None`.
    pub(super) fn lower_if(
        &mut self,
        test: Expr,
        body: Vec<Node>,
        or_else: Vec<Node>,
        tail: bool,
    ) -> Result<Expr, LowerError> {
        let test = self.lower_expr(test)?;
        self.scopes.current_mut().enter_branch();
        let body = self.lower_body(body, tail)?;
        let or_else = self.lower_body(or_else, tail)?;
        self.scopes.current_mut().exit_branch();
        Ok(Expr::if_else(test, body, or_else))
    }

    /// `[body for _ in iter(lambda: bool(test), False)]`
    ///
    /// `iter` calls the predicate before every iteration and stops on the first `False`.
    pub(super) fn lower_while(&mut self, test: Expr, body: Vec<Node>, or_else: Vec<Node>) -> Result<Expr, LowerError> {
        let test = self.lower_expr(test)?;
        let predicate = Expr::thunk(self.call_builtin(Builtin::Bool, vec![test]));
        let counter = self.fresh_name();
        let body = self.lower_loop_body(body)?;
        let lowered = Expr::ListComp {
            elt: Box::new(body),
            generators: vec![Comprehension::new(
                Expr::name(counter),
                self.call_builtin(Builtin::Iter, vec![predicate, Expr::bool(false)]),
            )],
        };
        self.with_loop_else(lowered, or_else)
    }

    /// `[body for target in iter]`
    ///
    /// An iterable containing a walrus is bound to a synthetic name first, as
    /// `[(it := iter), [body for target in it]][-1]`.
    pub(super) fn lower_for(
        &mut self,
        target: Expr,
        iter: Expr,
        body: Vec<Node>,
        or_else: Vec<Node>,
    ) -> Result<Expr, LowerError> {
        let mut iter = self.lower_expr(iter)?;
        let mut hoisted = None;
        if binds_in_place(&iter) {
            let temp = self.fresh_name();
            hoisted = Some(Expr::named(&temp, iter));
            iter = Expr::name(temp);
        }
        let mut names = Vec::new();
        target_names(&target, &mut names)?;
        let masked = self.scopes.current_mut().mask(names);
        let body = self.lower_loop_body(body)?;
        self.scopes.current_mut().unmask(masked);
        let mut lowered = Expr::ListComp {
            elt: Box::new(body),
            generators: vec![Comprehension::new(target, iter)],
        };
        if let Some(hoisted) = hoisted {
            lowered = Expr::last_of(vec![hoisted, lowered]);
        }
        self.with_loop_else(lowered, or_else)
    }

    fn lower_loop_body(&mut self, body: Vec<Node>) -> Result<Expr, LowerError> {
        self.scopes.current_mut().enter_branch();
        let body = self.lower_body(body, false)?;
        self.scopes.current_mut().exit_branch();
        Ok(body)
    }

    /// Without `break` a loop's `else` body always runs once the loop finishes.
    fn with_loop_else(&mut self, lowered: Expr, or_else: Vec<Node>) -> Result<Expr, LowerError> {
        if or_else.is_empty() {
            return Ok(lowered);
        }
        let or_else = self.lower_body(or_else, false)?;
        Ok(Expr::last_of(vec![lowered, or_else]))
    }

    /// ```python
    /// [getattr((m1 := ctx1), '__enter__')(), ..., body,
    ///  getattr(m1, '__exit__')(None, None, None), ...][n]
    /// ```
    ///
    /// Managers are entered in order and exited in the same order once the body finished.
    /// Nothing is released if the body raises.
    pub(super) fn lower_with(&mut self, items: Vec<WithItem>, body: Vec<Node>, tail: bool) -> Result<Expr, LowerError> {
        let mut exprs = Vec::with_capacity(items.len() * 2 + 1);
        let mut managers = Vec::with_capacity(items.len());
        for WithItem {
            context_expr,
            optional_vars,
        } in items
        {
            let context = self.lower_expr(context_expr)?;
            let manager = self.fresh_name();
            let enter = self.call_builtin(
                Builtin::Getattr,
                vec![Expr::named(&manager, context), Expr::str(Dunder::Enter.name())],
            );
            let enter = Expr::call(enter, Vec::new());
            exprs.push(match optional_vars {
                Some(target) => self.assign_to(target, enter)?,
                None => enter,
            });
            managers.push(manager);
        }
        let body_index = super::position(exprs.len());
        exprs.push(self.lower_body(body, tail)?);
        for manager in managers {
            let exit = Expr::str(Dunder::Exit.name());
            let exit = self.call_builtin(Builtin::Getattr, vec![Expr::name(manager), exit]);
            exprs.push(Expr::call(exit, vec![Expr::none(), Expr::none(), Expr::none()]));
        }
        Ok(Expr::subscript(Expr::List(exprs), body_index))
    }
}

/// Collects the names bound by a loop or comprehension target.
pub(super) fn target_names(target: &Expr, names: &mut Vec<String>) -> Result<(), LowerError> {
    match target {
        Expr::Name(name) => names.push(name.clone()),
        Expr::Tuple(elements) | Expr::List(elements) => {
            for element in elements {
                target_names(element, names)?;
            }
        }
        _ => return Err(Unsupported::LoopTarget.into()),
    }
    Ok(())
}
