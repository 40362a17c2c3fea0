//! Runtime support definitions prepended to lowered programs.
//!
//! Each helper is a single top-level assignment of an expression, so the lowered program
//! stays free of statements apart from module-level assignments. Helpers reach builtins
//! through the alias defined in [`crate::builtins`], which is emitted ahead of them.
//!
//! | Helper | Call shape | Purpose |
//! |--------|------------|---------|
//! | [`Injection::Throw`] | `throw(exc)` | raise the exception instance `exc` as is |
//! | [`Injection::Raise`] | `raise(exc, [cause])` | raise a fresh copy of `exc`, chaining `cause` |
//! | [`Injection::Try`] | `try(body, handlers, final, orelse)` | run a lowered `try` statement |

use ahash::AHashSet;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::{
    ast::{Comprehension, DictItem, Expr, Kwarg, Param, Parameters, TopLevel},
    builtins::{Builtin, Dunder, alias_definition},
    names::NameGenerator,
};

/// Support constructs the lowering pass can require.
///
/// Declaration order is the order definitions are emitted in, so every helper comes after
/// the ones it calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Injection {
    Throw,
    Raise,
    Try,
}

impl Injection {
    /// Name the helper is bound to in the lowered program.
    pub fn helper_name(self, names: &NameGenerator) -> String {
        names.reserved(self.into())
    }

    /// Helpers this one calls.
    pub fn requires(self) -> &'static [Self] {
        match self {
            Self::Throw => &[],
            Self::Raise | Self::Try => &[Self::Throw],
        }
    }

    fn definition(self, names: &NameGenerator) -> Expr {
        match self {
            Self::Throw => throw_helper(names),
            Self::Raise => raise_helper(names),
            Self::Try => try_helper(names),
        }
    }
}

/// Tags collected while lowering one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionSet {
    tags: AHashSet<Injection>,
}

impl InjectionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag, returning true if it was not present yet.
    pub fn insert(&mut self, tag: Injection) -> bool {
        self.tags.insert(tag)
    }

    pub fn contains(&self, tag: Injection) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Present tags in emission order.
    pub fn iter(&self) -> impl Iterator<Item = Injection> + '_ {
        Injection::iter().filter(|tag| self.tags.contains(tag))
    }
}

/// Top-level definitions for every tag in `tags` and the helpers those call, each exactly
/// once, in catalog order after the builtins alias.
///
/// The driver places these before all lowered statements so every use follows its
/// definition.
pub fn definitions_for(tags: &InjectionSet, names: &NameGenerator) -> Vec<TopLevel> {
    if tags.is_empty() {
        return Vec::new();
    }
    let needed = |tag: &Injection| tags.contains(*tag) || tags.iter().any(|present| present.requires().contains(tag));
    let mut defs = vec![alias_definition(names)];
    defs.extend(Injection::iter().filter(needed).map(|tag| TopLevel::Assign {
        targets: vec![Expr::name(tag.helper_name(names))],
        value: tag.definition(names),
    }));
    defs
}

/// `throw(exc)`: raises `exc` from inside an expression.
fn throw(names: &NameGenerator, exc: Expr) -> Expr {
    Expr::call(Expr::name(Injection::Throw.helper_name(names)), vec![exc])
}

fn item(expr: &Expr, index: i64) -> Expr {
    Expr::subscript(expr.clone(), Expr::int(index))
}

/// ```python
/// (lambda future: lambda exc: [(cell := future()), cell.set_exception(exc), cell.result()][-1])(
///     getattr(__import__('concurrent.futures', fromlist=('Future',)), 'Future'))
/// ```
///
/// `Future.result` re-raises the stored instance from an ordinary function frame. Throwing
/// into a generator instead would turn `StopIteration` into `RuntimeError`.
fn throw_helper(names: &NameGenerator) -> Expr {
    let cell = Expr::name("cell");
    let future = Builtin::Getattr.call(
        names,
        vec![
            Expr::Call {
                callable: Box::new(Builtin::Import.expr(names)),
                args: vec![Expr::str("concurrent.futures")],
                kwargs: vec![Kwarg {
                    name: Some("fromlist".to_owned()),
                    value: Expr::Tuple(vec![Expr::str("Future")]),
                }],
            },
            Expr::str("Future"),
        ],
    );
    let throw = Expr::lambda(
        Parameters::positional(["exc"]),
        Expr::last_of(vec![
            Expr::named("cell", Expr::call(Expr::name("future"), Vec::new())),
            Expr::method_call(cell.clone(), "set_exception", vec![Expr::name("exc")]),
            Expr::method_call(cell, "result", Vec::new()),
        ]),
    );
    Expr::call(Expr::lambda(Parameters::positional(["future"]), throw), vec![future])
}

/// ```python
/// lambda exc, *cause: [
///     (error := exc() if isinstance(exc, type) else type(exc)(*exc.args)),
///     setattr(error, '__cause__', cause[0]) if cause else None,
///     throw(error),
/// ][-1]
/// ```
///
/// A class is instantiated without arguments; an instance is copied into a new object of
/// the same type built from the same constructor arguments.
fn raise_helper(names: &NameGenerator) -> Expr {
    let exc = Expr::name("exc");
    let cause = Expr::name("cause");
    let error = Expr::name("error");

    let instantiate = Expr::if_else(
        Builtin::Isinstance.call(names, vec![exc.clone(), Builtin::Type.expr(names)]),
        Expr::call(exc.clone(), Vec::new()),
        Expr::call(
            Builtin::Type.call(names, vec![exc.clone()]),
            vec![Expr::Starred(Box::new(Expr::attr(exc, "args")))],
        ),
    );
    let chain = Expr::if_else(
        cause.clone(),
        Builtin::Setattr.call(
            names,
            vec![error.clone(), Expr::str(Dunder::Cause.name()), item(&cause, 0)],
        ),
        Expr::none(),
    );
    let params = Parameters {
        args: vec![Param::new("exc")],
        vararg: Some(Param::new("cause")),
        ..Parameters::default()
    };
    Expr::lambda(
        params,
        Expr::last_of(vec![Expr::named("error", instantiate), chain, throw(names, error)]),
    )
}

/// `(lambda capture: <dispatch>)(<capture>)`
///
/// `capture(thunk)` runs the thunk and reports the outcome as an explicit tagged pair,
/// `(True, value)` or `(False, exception)`. The dispatcher inspects those pairs with
/// ordinary conditionals:
///
/// ```python
/// lambda body, handlers, final, orelse: [
///     (outcome := capture(body)),
///     (handler := None if outcome[0] else next((h for t, h in handlers if isinstance(outcome[1], t)), None)),
///     (outcome := (capture(orelse) if orelse is not None else outcome) if outcome[0]
///         else capture(lambda: handler(outcome[1])) if handler is not None else outcome),
///     (override := final()),
///     None if outcome[0] or override else throw(outcome[1]),
/// ][-1]
/// ```
///
/// `handlers` is a tuple of `(type, thunk)` pairs searched in order, first match wins.
/// `final` runs exactly once; a truthy result means the `finally` body returned and the
/// pending exception, if any, is dropped. `orelse` is `None` when there is no `else` body.
fn try_helper(names: &NameGenerator) -> Expr {
    let outcome = Expr::name("outcome");
    let handler = Expr::name("handler");
    let capture = |thunk: Expr| Expr::call(Expr::name("capture"), vec![thunk]);

    let first_match = Builtin::Next.call(
        names,
        vec![
            Expr::GeneratorExp {
                elt: Box::new(Expr::name("h")),
                generators: vec![Comprehension {
                    target: Expr::Tuple(vec![Expr::name("t"), Expr::name("h")]),
                    iter: Expr::name("handlers"),
                    ifs: vec![Builtin::Isinstance.call(names, vec![item(&outcome, 1), Expr::name("t")])],
                    is_async: false,
                }],
            },
            Expr::none(),
        ],
    );
    let select = Expr::if_else(item(&outcome, 0), Expr::none(), first_match);

    let run_else = Expr::if_else(
        is_not_none(Expr::name("orelse")),
        capture(Expr::name("orelse")),
        outcome.clone(),
    );
    let run_handler = Expr::if_else(
        is_not_none(handler.clone()),
        capture(Expr::thunk(Expr::call(handler, vec![item(&outcome, 1)]))),
        outcome.clone(),
    );
    let settle = Expr::if_else(item(&outcome, 0), run_else, run_handler);

    let finish = Expr::if_else(
        Expr::BoolOp {
            op: crate::ast::BoolOperator::Or,
            values: vec![item(&outcome, 0), Expr::name("override")],
        },
        Expr::none(),
        throw(names, item(&outcome, 1)),
    );

    let dispatch = Expr::lambda(
        Parameters::positional(["body", "handlers", "final", "orelse"]),
        Expr::last_of(vec![
            Expr::named("outcome", capture(Expr::name("body"))),
            Expr::named("handler", select),
            Expr::named("outcome", settle),
            Expr::named("override", Expr::call(Expr::name("final"), Vec::new())),
            finish,
        ]),
    );
    Expr::call(
        Expr::lambda(Parameters::positional(["capture"]), dispatch),
        vec![capture_helper(names)],
    )
}

/// ```python
/// (lambda guard: lambda thunk: [
///     (cell := guard()),
///     (value := cell(thunk)()),
///     (True, value) if cell.error is None else (False, cell.error),
/// ][-1])(type('Guard', (getattr(__import__('contextlib'), 'ContextDecorator'),), {
///     'error': None,
///     '__enter__': lambda self: self,
///     '__exit__': lambda self, kind, error, trace: [setattr(self, 'error', error), True][-1],
/// }))
/// ```
fn capture_helper(names: &NameGenerator) -> Expr {
    let cell = Expr::name("cell");
    let error = Expr::attr(cell.clone(), "error");

    let context_decorator = Builtin::Getattr.call(
        names,
        vec![
            Builtin::Import.call(names, vec![Expr::str("contextlib")]),
            Expr::str("ContextDecorator"),
        ],
    );
    let exit = Expr::lambda(
        Parameters::positional(["self", "kind", "error", "trace"]),
        Expr::last_of(vec![
            Builtin::Setattr.call(
                names,
                vec![Expr::name("self"), Expr::str("error"), Expr::name("error")],
            ),
            Expr::bool(true),
        ]),
    );
    let guard_class = Builtin::Type.call(
        names,
        vec![
            Expr::str("Guard"),
            Expr::Tuple(vec![context_decorator]),
            Expr::Dict(vec![
                DictItem::Pair {
                    key: Expr::str("error"),
                    value: Expr::none(),
                },
                DictItem::Pair {
                    key: Expr::str(Dunder::Enter.name()),
                    value: Expr::lambda(Parameters::positional(["self"]), Expr::name("self")),
                },
                DictItem::Pair {
                    key: Expr::str(Dunder::Exit.name()),
                    value: exit,
                },
            ]),
        ],
    );

    let report = Expr::if_else(
        Expr::compare(error.clone(), crate::ast::CmpOperator::Is, Expr::none()),
        Expr::Tuple(vec![Expr::bool(true), Expr::name("value")]),
        Expr::Tuple(vec![Expr::bool(false), error]),
    );
    let capture = Expr::lambda(
        Parameters::positional(["thunk"]),
        Expr::last_of(vec![
            Expr::named("cell", Expr::call(Expr::name("guard"), Vec::new())),
            Expr::named(
                "value",
                Expr::call(Expr::call(cell, vec![Expr::name("thunk")]), Vec::new()),
            ),
            report,
        ]),
    );
    Expr::call(
        Expr::lambda(Parameters::positional(["guard"]), capture),
        vec![guard_class],
    )
}

fn is_not_none(expr: Expr) -> Expr {
    Expr::compare(expr, crate::ast::CmpOperator::IsNot, Expr::none())
}
