//! Syntax tree consumed and produced by the lowering pass.
//!
//! The input side ([`Module`], [`Node`], [`Expr`]) mirrors the statement-oriented tree an
//! external front-end hands over. The output side ([`Program`], [`TopLevel`]) can only hold
//! expressions, plus plain assignments at the module top level.
//!
//! Every node owns its children. Lowering builds output nodes with the constructors on
//! [`Expr`] and never shares a subtree between two positions.

use num_bigint::BigInt;
use strum::{Display, IntoStaticStr};

/// A parsed module: the ordered top-level statements of one source file.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Module {
    pub body: Vec<Node>,
}

/// A statement in the input tree.
///
/// `Pass`, `Break`, `Continue`, `Delete`, `Global` and `Nonlocal` have no expression-only
/// equivalent and are rejected by the lowering pass; they are kept here so front-ends can
/// hand over complete trees and get a precise error back.
#[derive(Debug, Clone, PartialEq, IntoStaticStr, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum Node {
    /// Expression statement, e.g. a bare call.
    Expr(Expr),
    /// `return` or `return value`.
    Return(Option<Expr>),
    /// `t1 = t2 = value`, one entry in `targets` per `=`.
    Assign { targets: Vec<Expr>, value: Expr },
    /// `target: annotation` or `target: annotation = value`.
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    /// `target op= value`
    AugAssign { target: Expr, op: Operator, value: Expr },
    If {
        test: Expr,
        body: Vec<Self>,
        or_else: Vec<Self>,
    },
    While {
        test: Expr,
        body: Vec<Self>,
        or_else: Vec<Self>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Self>,
        or_else: Vec<Self>,
        is_async: bool,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Self>,
        is_async: bool,
    },
    Try(Try),
    /// `raise`, `raise exc` or `raise exc from cause`.
    Raise { exc: Option<Expr>, cause: Option<Expr> },
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    /// `import a.b.c` / `import a.b.c as d`
    Import { names: Vec<Alias> },
    /// `from module import a, b as c`; `level` counts the leading dots.
    ImportFrom {
        module: Option<String>,
        names: Vec<Alias>,
        level: u32,
    },
    Pass,
    Break,
    Continue,
    Delete { targets: Vec<Expr> },
    Global { names: Vec<String> },
    Nonlocal { names: Vec<String> },
}

impl Node {
    /// Short lowercase name of the statement kind, used in traces.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// A `try` statement with its handlers, `else` and `finally` bodies.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Try {
    pub body: Vec<Node>,
    pub handlers: Vec<ExceptHandler>,
    pub or_else: Vec<Node>,
    pub finally: Vec<Node>,
    /// `try: ... except* E: ...`
    pub is_star: bool,
}

/// An `except` clause.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExceptHandler {
    /// Exception type(s) to catch. None = bare except (catches all).
    pub exc_type: Option<Expr>,
    /// Variable name for `except X as e:`.
    pub name: Option<String>,
    pub body: Vec<Node>,
}

/// One `expr as target` item of a `with` statement.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WithItem {
    pub context_expr: Expr,
    pub optional_vars: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Parameters,
    pub body: Vec<Node>,
    /// Decorators in source order (outermost first).
    pub decorators: Vec<Expr>,
    /// Return annotation, dropped during lowering.
    pub returns: Option<Expr>,
    pub is_async: bool,
}

impl FunctionDef {
    /// A plain `def name(): body` without parameters, decorators or annotations.
    pub fn new(name: impl Into<String>, body: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            params: Parameters::default(),
            body,
            decorators: Vec::new(),
            returns: None,
            is_async: false,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Parameters) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub keywords: Vec<Kwarg>,
    pub body: Vec<Node>,
    pub decorators: Vec<Expr>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, body: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            keywords: Vec::new(),
            body,
            decorators: Vec::new(),
        }
    }
}

/// `name` or `name as asname` in an import statement.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    pub fn new(name: impl Into<String>, asname: Option<&str>) -> Self {
        Self {
            name: name.into(),
            asname: asname.map(str::to_owned),
        }
    }
}

/// A function or lambda parameter list.
///
/// Order matches Python's signature layout:
/// `posonly, /, args, *vararg, kwonly, **kwarg`.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Parameters {
    pub posonly: Vec<Param>,
    pub args: Vec<Param>,
    pub vararg: Option<Param>,
    pub kwonly: Vec<Param>,
    pub kwarg: Option<Param>,
}

impl Parameters {
    /// Plain positional parameters without defaults.
    pub fn positional<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            args: names.into_iter().map(Param::new).collect(),
            ..Self::default()
        }
    }

    /// Iterates over every parameter in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.posonly
            .iter()
            .chain(&self.args)
            .chain(&self.vararg)
            .chain(&self.kwonly)
            .chain(&self.kwarg)
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub annotation: Option<Expr>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            annotation: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

/// Keyword argument in a call (`name=value`), or `**value` when `name` is None.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Kwarg {
    pub name: Option<String>,
    pub value: Expr,
}

/// A `key: value` entry or a `**mapping` unpack in a dict literal.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DictItem {
    Pair { key: Expr, value: Expr },
    Unpack { mapping: Expr },
}

/// A generator clause in a comprehension: `for target in iter [if cond]...`
///
/// Multiple clauses nest, the rightmost varies fastest.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

impl Comprehension {
    pub fn new(target: Expr, iter: Expr) -> Self {
        Self {
            target,
            iter,
            ifs: Vec::new(),
            is_async: false,
        }
    }
}

/// Constant values.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Literal {
    Ellipsis,
    None,
    Bool(bool),
    Int(i64),
    /// Integer literal outside the `i64` range.
    LongInt(BigInt),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

/// Binary operators for arithmetic and bitwise operations.
///
/// Uses strum `Display` derive with per-variant serialization for operator symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, serde::Serialize, serde::Deserialize)]
pub enum Operator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mult,
    #[strum(serialize = "@")]
    MatMult,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "**")]
    Pow,
    #[strum(serialize = "<<")]
    LShift,
    #[strum(serialize = ">>")]
    RShift,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "//")]
    FloorDiv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, serde::Serialize, serde::Deserialize)]
pub enum BoolOperator {
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
}

/// Defined separately since these operators always return a bool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, serde::Serialize, serde::Deserialize)]
pub enum CmpOperator {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    LtE,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    GtE,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "is not")]
    IsNot,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "not in")]
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, serde::Serialize, serde::Deserialize)]
pub enum UnaryOperator {
    #[strum(serialize = "not ")]
    Not,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "~")]
    Invert,
}

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    /// Call of an arbitrary expression. Positional arguments may be [`Expr::Starred`].
    Call {
        callable: Box<Self>,
        args: Vec<Self>,
        kwargs: Vec<Kwarg>,
    },
    /// Attribute access expression (e.g., `point.x`).
    AttrGet { object: Box<Self>, attr: String },
    Op {
        left: Box<Self>,
        op: Operator,
        right: Box<Self>,
    },
    /// `a and b and c` / `a or b`; always at least two values.
    BoolOp { op: BoolOperator, values: Vec<Self> },
    /// Chain comparison expression: `a < b < c < d`
    Compare {
        left: Box<Self>,
        comparisons: Vec<(CmpOperator, Self)>,
    },
    Unary { op: UnaryOperator, operand: Box<Self> },
    /// Lambda expression: `lambda params: body`
    Lambda { params: Box<Parameters>, body: Box<Self> },
    /// Conditional expression (ternary operator): `body if test else orelse`
    IfElse {
        test: Box<Self>,
        body: Box<Self>,
        orelse: Box<Self>,
    },
    ListComp { elt: Box<Self>, generators: Vec<Comprehension> },
    SetComp { elt: Box<Self>, generators: Vec<Comprehension> },
    DictComp {
        key: Box<Self>,
        value: Box<Self>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp { elt: Box<Self>, generators: Vec<Comprehension> },
    List(Vec<Self>),
    Tuple(Vec<Self>),
    /// Set literal expression: `{1, 2, 3}`.
    ///
    /// Note: `{}` is always a dict. An empty set renders as `set()`.
    Set(Vec<Self>),
    Dict(Vec<DictItem>),
    Subscript { object: Box<Self>, index: Box<Self> },
    /// Slice literal from `x[start:stop:step]`; only valid as a subscript index.
    Slice {
        lower: Option<Box<Self>>,
        upper: Option<Box<Self>>,
        step: Option<Box<Self>>,
    },
    /// Named expression (walrus operator): `(target := value)`
    Named { target: String, value: Box<Self> },
    /// `*value` in call arguments, sequence displays and assignment targets.
    Starred(Box<Self>),
    Await(Box<Self>),
    Yield { value: Option<Box<Self>> },
    YieldFrom { value: Box<Self> },
}

impl Expr {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn none() -> Self {
        Self::Literal(Literal::None)
    }

    pub fn bool(value: bool) -> Self {
        Self::Literal(Literal::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::Literal(Literal::Int(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::Literal(Literal::Str(value.into()))
    }

    pub fn call(callable: Self, args: Vec<Self>) -> Self {
        Self::Call {
            callable: Box::new(callable),
            args,
            kwargs: Vec::new(),
        }
    }

    pub fn attr(object: Self, attr: impl Into<String>) -> Self {
        Self::AttrGet {
            object: Box::new(object),
            attr: attr.into(),
        }
    }

    /// `object.method(args)`
    pub fn method_call(object: Self, method: &str, args: Vec<Self>) -> Self {
        Self::call(Self::attr(object, method), args)
    }

    pub fn subscript(object: Self, index: Self) -> Self {
        Self::Subscript {
            object: Box::new(object),
            index: Box::new(index),
        }
    }

    pub fn named(target: impl Into<String>, value: Self) -> Self {
        Self::Named {
            target: target.into(),
            value: Box::new(value),
        }
    }

    pub fn lambda(params: Parameters, body: Self) -> Self {
        Self::Lambda {
            params: Box::new(params),
            body: Box::new(body),
        }
    }

    /// Zero-argument lambda wrapping `body`.
    pub fn thunk(body: Self) -> Self {
        Self::lambda(Parameters::default(), body)
    }

    pub fn if_else(test: Self, body: Self, orelse: Self) -> Self {
        Self::IfElse {
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        }
    }

    pub fn op(left: Self, op: Operator, right: Self) -> Self {
        Self::Op {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn compare(left: Self, op: CmpOperator, right: Self) -> Self {
        Self::Compare {
            left: Box::new(left),
            comparisons: vec![(op, right)],
        }
    }

    /// Evaluates `exprs` left to right and yields the last value.
    ///
    /// No wrapper is built for a single expression, and an empty list is `None`.
    pub fn last_of(mut exprs: Vec<Self>) -> Self {
        match exprs.len() {
            0 => Self::none(),
            1 => exprs.pop().unwrap_or_else(Self::none),
            _ => Self::subscript(Self::List(exprs), Self::int(-1)),
        }
    }
}

/// The lowered program.
///
/// Top-level items run in order; function bodies, branches and loops below them are
/// expressions only.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Program {
    pub body: Vec<TopLevel>,
}

/// One module-level item of a lowered [`Program`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TopLevel {
    Expr(Expr),
    /// `t1 = t2 = value` kept as a statement so later items can refer to the names.
    Assign { targets: Vec<Expr>, value: Expr },
}
