//! `raise` and `try`.
//!
//! A `try` statement is split into thunks (body, handlers, `else`, `finally`) that the
//! injected dispatch helper calls. The thunks cannot rebind the enclosing function's
//! locals, so while they are lowered every write, and every read of a name the shadow
//! dictionary may hold, goes through that dictionary instead:
//!
//! ```python
//! [(d := {'<result>': None, 'x': x}),               # snapshot definite locals
//!  try_helper(lambda: d.__setitem__('<result>', ...),  # body
//!             ((ValueError, lambda e: ...),),          # (type, handler) pairs
//!             lambda: None,                            # finally
//!             None),                                   # else
//!  (x := d['x']),                                      # copy back what was written
//!  d['<result>']][-1]
//! ```
//!
//! A `try` nested inside another one starts from a copy of the enclosing dictionary and
//! copies its writes back into it.

use super::{Lowerer, shadow_lookup, shadow_store};
use crate::{
    ast::{CmpOperator, DictItem, ExceptHandler, Expr, Node, Parameters, Try},
    builtins::Builtin,
    error::{LowerError, Unsupported},
    injections::Injection,
    scope::ShadowInit,
    tracer::LowerTracer,
};

/// Shadow dictionary key holding the value of the whole `try` statement.
///
/// Not a valid identifier, so it cannot collide with a variable entry.
const RESULT_KEY: &str = "<result>";

impl<Tr: LowerTracer> Lowerer<'_, Tr> {
    /// `raise exc [from cause]` calls the raise helper; a bare `raise` inside a handler
    /// re-raises the handled exception as is.
    pub(super) fn lower_raise(&mut self, exc: Option<Expr>, cause: Option<Expr>) -> Result<Expr, LowerError> {
        let Some(exc) = exc else {
            let handled = self
                .scopes
                .current()
                .current_handler()
                .ok_or(Unsupported::BareRaise)?
                .to_owned();
            let throw = self.require(Injection::Throw);
            return Ok(Expr::call(throw, vec![Expr::name(handled)]));
        };
        let helper = self.require(Injection::Raise);
        let mut args = vec![self.lower_expr(exc)?];
        if let Some(cause) = cause {
            args.push(self.lower_expr(cause)?);
        }
        Ok(Expr::call(helper, args))
    }

    pub(super) fn lower_try(&mut self, node: Try, tail: bool) -> Result<Expr, LowerError> {
        let Try {
            body,
            handlers,
            or_else,
            finally,
            is_star,
        } = node;
        if is_star {
            return Err(Unsupported::ExceptionGroup.into());
        }
        let helper = self.require(Injection::Try);

        let dict = self.fresh_name();
        let init = match self.scopes.current_mut().open_shadow(dict.clone()) {
            ShadowInit::Snapshot(names) => {
                let mut items = vec![DictItem::Pair {
                    key: Expr::str(RESULT_KEY),
                    value: Expr::none(),
                }];
                items.extend(names.into_iter().map(|name| DictItem::Pair {
                    key: Expr::str(&name),
                    value: Expr::name(name),
                }));
                Expr::Dict(items)
            }
            ShadowInit::CopyOf(outer) => Expr::Dict(vec![DictItem::Unpack {
                mapping: Expr::name(outer),
            }]),
        };
        self.tracer.on_shadow_push(&dict, self.scopes.current().shadow_depth());

        let body_returns = matches!(body.last(), Some(Node::Return(_)));
        let body_value = self.lower_body(body, tail)?;
        let body_thunk = Expr::thunk(store_result(&dict, body_value));
        let after_body = self.scopes.current().settled_keys();

        // a handler may start after any prefix of the body
        let mut pairs = Vec::with_capacity(handlers.len());
        for handler in handlers {
            self.scopes.current_mut().reset_settled(None);
            self.lower_handler(&dict, handler, tail, &mut pairs)?;
        }

        // a `return` at the end of the body skips `else`
        let else_thunk = if or_else.is_empty() || body_returns {
            Expr::none()
        } else {
            self.scopes.current_mut().reset_settled(Some(after_body));
            let value = self.lower_body(or_else, tail)?;
            Expr::thunk(store_result(&dict, value))
        };

        let finally_thunk = if finally.is_empty() {
            Expr::thunk(Expr::none())
        } else {
            let overrides = matches!(finally.last(), Some(Node::Return(_)));
            self.scopes.current_mut().reset_settled(None);
            let value = self.lower_body(finally, false)?;
            let value = if overrides { store_result(&dict, value) } else { value };
            Expr::thunk(Expr::last_of(vec![value, Expr::bool(overrides)]))
        };

        let frame = self.scopes.current_mut().close_shadow();
        self.tracer.on_shadow_pop(&dict, self.scopes.current().shadow_depth());

        let mut exprs = vec![
            Expr::named(&dict, init),
            Expr::call(helper, vec![body_thunk, Expr::Tuple(pairs), finally_thunk, else_thunk]),
        ];
        if let Some(frame) = frame {
            for name in frame.written {
                let value = shadow_lookup(&dict, &name);
                if frame.guaranteed.contains(&name) {
                    exprs.push(self.write_name(name, value, false)?);
                } else {
                    // the write may not have happened
                    let present = Expr::compare(Expr::str(&name), CmpOperator::In, Expr::name(&dict));
                    self.scopes.current_mut().enter_branch();
                    let write = self.write_name(name, value, false)?;
                    self.scopes.current_mut().exit_branch();
                    exprs.push(Expr::if_else(present, write, Expr::none()));
                }
            }
        }
        exprs.push(shadow_lookup(&dict, RESULT_KEY));
        Ok(Expr::last_of(exprs))
    }

    /// Adds one `(type, thunk)` pair per caught type to `pairs`.
    ///
    /// A handler for several types is built once, bound to a synthetic name in its first
    /// pair and referenced by that name in the others.
    fn lower_handler(
        &mut self,
        dict: &str,
        handler: ExceptHandler,
        tail: bool,
        pairs: &mut Vec<Expr>,
    ) -> Result<(), LowerError> {
        let ExceptHandler { exc_type, name, body } = handler;
        let types = match exc_type {
            None => vec![self.builtin(Builtin::BaseException)],
            Some(Expr::Tuple(types)) => self.lower_exprs(types)?,
            Some(exc_type) => vec![self.lower_expr(exc_type)?],
        };

        let param = self.fresh_name();
        let mut steps = Vec::with_capacity(2);
        if let Some(name) = name {
            steps.push(self.write_name(name, Expr::name(&param), false)?);
        }
        self.scopes.current_mut().push_handler(param.clone());
        let value = self.lower_body(body, tail)?;
        self.scopes.current_mut().pop_handler();
        steps.push(store_result(dict, value));
        let thunk = Expr::lambda(Parameters::positional([param]), Expr::last_of(steps));

        let mut types = types.into_iter();
        match (types.next(), types.len()) {
            (None, _) => {}
            (Some(exc_type), 0) => pairs.push(Expr::Tuple(vec![exc_type, thunk])),
            (Some(exc_type), _) => {
                let shared = self.fresh_name();
                pairs.push(Expr::Tuple(vec![exc_type, Expr::named(&shared, thunk)]));
                pairs.extend(types.map(|exc_type| Expr::Tuple(vec![exc_type, Expr::name(&shared)])));
            }
        }
        Ok(())
    }
}

/// `dict.__setitem__('<result>', value)`
fn store_result(dict: &str, value: Expr) -> Expr {
    shadow_store(dict, RESULT_KEY, value)
}
