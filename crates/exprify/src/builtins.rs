//! Runtime capabilities the lowered program relies on.
//!
//! Lowered code only calls Python builtins and special methods that exist in every
//! interpreter; nothing is imported except through `__import__`.
//!
//! Builtins are never referenced by their bare names. A module-level alias bound to the
//! `builtins` module is defined before anything else, and lowered code goes through it, so a
//! user parameter or variable called `type` or `iter` cannot capture those calls.

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    ast::{Expr, TopLevel},
    names::NameGenerator,
};

/// Suffix of the alias bound to the `builtins` module.
const ALIAS: &str = "builtins";

/// Builtin callables referenced by lowered code.
///
/// Uses strum derives for `Display`, `FromStr` and `&'static str` conversions.
/// Variants serialize to lowercase unless they carry an explicit name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Builtin {
    Getattr,
    Setattr,
    /// `type(name, bases, members)` builds classes; `type(obj)` reads an object's class.
    Type,
    Isinstance,
    Iter,
    Next,
    Bool,
    Tuple,
    Len,
    #[strum(serialize = "ValueError")]
    ValueError,
    #[strum(serialize = "__import__")]
    Import,
    #[strum(serialize = "BaseException")]
    BaseException,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// `{alias}.name`
    pub fn expr(self, names: &NameGenerator) -> Expr {
        Expr::attr(alias(names), self.name())
    }

    pub fn call(self, names: &NameGenerator, args: Vec<Expr>) -> Expr {
        Expr::call(self.expr(names), args)
    }
}

fn alias(names: &NameGenerator) -> Expr {
    Expr::name(names.reserved(ALIAS))
}

/// `{prefix}builtins = __import__('builtins')`
///
/// Emitted first, so the bare `__import__` still refers to the real builtin.
pub fn alias_definition(names: &NameGenerator) -> TopLevel {
    TopLevel::Assign {
        targets: vec![alias(names)],
        value: Expr::call(Expr::name(Builtin::Import.name()), vec![Expr::str(ALIAS)]),
    }
}

/// Special attribute and method names used by the lowering rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum Dunder {
    #[strum(serialize = "__enter__")]
    Enter,
    #[strum(serialize = "__exit__")]
    Exit,
    #[strum(serialize = "__setitem__")]
    SetItem,
    #[strum(serialize = "__cause__")]
    Cause,
    #[strum(serialize = "__doc__")]
    Doc,
}

impl Dunder {
    pub fn name(self) -> &'static str {
        self.into()
    }
}
