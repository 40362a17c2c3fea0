//! Printable Python form of the lowered tree.
//!
//! Output is valid, tokenizable source: parentheses are inserted from operator precedence,
//! name bindings are always parenthesized and strings use single-quoted repr form. Layout
//! beyond one top-level item per line is left to downstream formatting tools.

use std::fmt::{self, Display, Formatter, Write};

use num_bigint::Sign;

use crate::ast::{
    BoolOperator, Comprehension, DictItem, Expr, Kwarg, Literal, Operator, Param, Parameters, Program, TopLevel,
    UnaryOperator,
};

// Binding strength, loosest first.
const LAMBDA: u8 = 1;
const TERNARY: u8 = 2;
const OR: u8 = 3;
const AND: u8 = 4;
const NOT: u8 = 5;
const CMP: u8 = 6;
const BIT_OR: u8 = 7;
const BIT_XOR: u8 = 8;
const BIT_AND: u8 = 9;
const SHIFT: u8 = 10;
const ARITH: u8 = 11;
const TERM: u8 = 12;
const FACTOR: u8 = 13;
const POWER: u8 = 14;
const AWAIT: u8 = 15;
const ATOM: u8 = 16;

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for item in &self.body {
            writeln!(f, "{item}")?;
        }
        Ok(())
    }
}

impl Display for TopLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expr(expr) => write_expr(f, expr, LAMBDA),
            Self::Assign { targets, value } => {
                for target in targets {
                    write_expr(f, target, LAMBDA)?;
                    f.write_str(" = ")?;
                }
                write_expr(f, value, LAMBDA)
            }
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_expr(f, self, LAMBDA)
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Lambda { .. } => LAMBDA,
        Expr::IfElse { .. } => TERNARY,
        Expr::BoolOp { op: BoolOperator::Or, .. } => OR,
        Expr::BoolOp { op: BoolOperator::And, .. } => AND,
        Expr::Unary { op: UnaryOperator::Not, .. } => NOT,
        Expr::Unary { .. } => FACTOR,
        Expr::Compare { .. } => CMP,
        Expr::Op { op, .. } => operator_precedence(*op),
        Expr::Await(_) => AWAIT,
        Expr::Literal(Literal::Int(i)) if *i < 0 => FACTOR,
        Expr::Literal(Literal::LongInt(i)) if i.sign() == Sign::Minus => FACTOR,
        Expr::Literal(Literal::Float(v)) if v.is_sign_negative() => FACTOR,
        _ => ATOM,
    }
}

fn operator_precedence(op: Operator) -> u8 {
    match op {
        Operator::BitOr => BIT_OR,
        Operator::BitXor => BIT_XOR,
        Operator::BitAnd => BIT_AND,
        Operator::LShift | Operator::RShift => SHIFT,
        Operator::Add | Operator::Sub => ARITH,
        Operator::Mult | Operator::MatMult | Operator::Div | Operator::Mod | Operator::FloorDiv => TERM,
        Operator::Pow => POWER,
    }
}

/// Writes `expr`, wrapped in parentheses when it binds looser than `min`.
fn write_expr(f: &mut Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if precedence(expr) < min {
        f.write_char('(')?;
        write_bare(f, expr)?;
        f.write_char(')')
    } else {
        write_bare(f, expr)
    }
}

fn write_bare(f: &mut Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Literal(literal) => write_literal(f, literal),
        Expr::Name(name) => f.write_str(name),
        Expr::Call { callable, args, kwargs } => {
            write_expr(f, callable, ATOM)?;
            f.write_char('(')?;
            write_call_args(f, args, kwargs)?;
            f.write_char(')')
        }
        Expr::AttrGet { object, attr } => {
            // `1.real` would lex as a float
            if matches!(**object, Expr::Literal(Literal::Int(_) | Literal::LongInt(_) | Literal::Float(_))) {
                write!(f, "({object})")?;
            } else {
                write_expr(f, object, ATOM)?;
            }
            write!(f, ".{attr}")
        }
        Expr::Op { left, op, right } => {
            let prec = operator_precedence(*op);
            let (left_min, right_min) = if *op == Operator::Pow {
                (prec + 1, FACTOR)
            } else {
                (prec, prec + 1)
            };
            write_expr(f, left, left_min)?;
            write!(f, " {op} ")?;
            write_expr(f, right, right_min)
        }
        Expr::BoolOp { op, values } => {
            let prec = precedence(expr);
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write_expr(f, value, prec + 1)?;
            }
            Ok(())
        }
        Expr::Compare { left, comparisons } => {
            write_expr(f, left, CMP + 1)?;
            for (op, right) in comparisons {
                write!(f, " {op} ")?;
                write_expr(f, right, CMP + 1)?;
            }
            Ok(())
        }
        Expr::Unary { op, operand } => {
            write!(f, "{op}")?;
            let min = if *op == UnaryOperator::Not { NOT } else { FACTOR };
            write_expr(f, operand, min)
        }
        Expr::Lambda { params, body } => {
            f.write_str("lambda")?;
            if !params.is_empty() {
                f.write_char(' ')?;
                write_params(f, params)?;
            }
            f.write_str(": ")?;
            write_expr(f, body, LAMBDA)
        }
        Expr::IfElse { test, body, orelse } => {
            write_expr(f, body, OR)?;
            f.write_str(" if ")?;
            write_expr(f, test, OR)?;
            f.write_str(" else ")?;
            write_expr(f, orelse, LAMBDA)
        }
        Expr::ListComp { elt, generators } => {
            f.write_char('[')?;
            write_expr(f, elt, TERNARY)?;
            write_generators(f, generators)?;
            f.write_char(']')
        }
        Expr::SetComp { elt, generators } => {
            f.write_char('{')?;
            write_expr(f, elt, TERNARY)?;
            write_generators(f, generators)?;
            f.write_char('}')
        }
        Expr::GeneratorExp { elt, generators } => {
            f.write_char('(')?;
            write_expr(f, elt, TERNARY)?;
            write_generators(f, generators)?;
            f.write_char(')')
        }
        Expr::DictComp { key, value, generators } => {
            f.write_char('{')?;
            write_expr(f, key, OR)?;
            f.write_str(": ")?;
            write_expr(f, value, TERNARY)?;
            write_generators(f, generators)?;
            f.write_char('}')
        }
        Expr::List(elements) => {
            f.write_char('[')?;
            write_elements(f, elements)?;
            f.write_char(']')
        }
        Expr::Tuple(elements) => {
            f.write_char('(')?;
            write_elements(f, elements)?;
            if elements.len() == 1 {
                f.write_char(',')?;
            }
            f.write_char(')')
        }
        Expr::Set(elements) if elements.is_empty() => f.write_str("set()"),
        Expr::Set(elements) => {
            f.write_char('{')?;
            write_elements(f, elements)?;
            f.write_char('}')
        }
        Expr::Dict(items) => {
            f.write_char('{')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                match item {
                    DictItem::Pair { key, value } => {
                        write_expr(f, key, OR)?;
                        f.write_str(": ")?;
                        write_expr(f, value, LAMBDA)?;
                    }
                    DictItem::Unpack { mapping } => {
                        f.write_str("**")?;
                        write_expr(f, mapping, BIT_OR)?;
                    }
                }
            }
            f.write_char('}')
        }
        Expr::Subscript { object, index } => {
            write_expr(f, object, ATOM)?;
            f.write_char('[')?;
            write_expr(f, index, LAMBDA)?;
            f.write_char(']')
        }
        Expr::Slice { lower, upper, step } => {
            if let Some(lower) = lower {
                write_expr(f, lower, TERNARY)?;
            }
            f.write_char(':')?;
            if let Some(upper) = upper {
                write_expr(f, upper, TERNARY)?;
            }
            if let Some(step) = step {
                f.write_char(':')?;
                write_expr(f, step, TERNARY)?;
            }
            Ok(())
        }
        Expr::Named { target, value } => {
            write!(f, "({target} := ")?;
            write_expr(f, value, LAMBDA)?;
            f.write_char(')')
        }
        Expr::Starred(value) => {
            f.write_char('*')?;
            write_expr(f, value, BIT_OR)
        }
        Expr::Await(value) => {
            f.write_str("await ")?;
            write_expr(f, value, ATOM)
        }
        Expr::Yield { value: None } => f.write_str("(yield)"),
        Expr::Yield { value: Some(value) } => {
            f.write_str("(yield ")?;
            write_expr(f, value, LAMBDA)?;
            f.write_char(')')
        }
        Expr::YieldFrom { value } => {
            f.write_str("(yield from ")?;
            write_expr(f, value, LAMBDA)?;
            f.write_char(')')
        }
    }
}

fn write_elements(f: &mut Formatter<'_>, elements: &[Expr]) -> fmt::Result {
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_expr(f, element, LAMBDA)?;
    }
    Ok(())
}

fn write_call_args(f: &mut Formatter<'_>, args: &[Expr], kwargs: &[Kwarg]) -> fmt::Result {
    write_elements(f, args)?;
    for (i, kwarg) in kwargs.iter().enumerate() {
        if i > 0 || !args.is_empty() {
            f.write_str(", ")?;
        }
        match &kwarg.name {
            Some(name) => {
                write!(f, "{name}=")?;
                write_expr(f, &kwarg.value, LAMBDA)?;
            }
            None => {
                f.write_str("**")?;
                write_expr(f, &kwarg.value, BIT_OR)?;
            }
        }
    }
    Ok(())
}

fn write_generators(f: &mut Formatter<'_>, generators: &[Comprehension]) -> fmt::Result {
    for generator in generators {
        f.write_str(if generator.is_async { " async for " } else { " for " })?;
        write_expr(f, &generator.target, BIT_OR)?;
        f.write_str(" in ")?;
        write_expr(f, &generator.iter, OR)?;
        for cond in &generator.ifs {
            f.write_str(" if ")?;
            write_expr(f, cond, OR)?;
        }
    }
    Ok(())
}

fn write_params(f: &mut Formatter<'_>, params: &Parameters) -> fmt::Result {
    let mut parts: Vec<String> = Vec::new();
    let param = |prefix: &str, p: &Param| match &p.default {
        Some(default) => format!("{prefix}{}={}", p.name, Paren(default, TERNARY)),
        None => format!("{prefix}{}", p.name),
    };
    parts.extend(params.posonly.iter().map(|p| param("", p)));
    if !params.posonly.is_empty() {
        parts.push("/".to_owned());
    }
    parts.extend(params.args.iter().map(|p| param("", p)));
    match &params.vararg {
        Some(vararg) => parts.push(param("*", vararg)),
        None if !params.kwonly.is_empty() => parts.push("*".to_owned()),
        None => {}
    }
    parts.extend(params.kwonly.iter().map(|p| param("", p)));
    if let Some(kwarg) = &params.kwarg {
        parts.push(param("**", kwarg));
    }
    f.write_str(&parts.join(", "))
}

/// Displays an expression at a minimum binding strength.
struct Paren<'a>(&'a Expr, u8);

impl Display for Paren<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_expr(f, self.0, self.1)
    }
}

fn write_literal(f: &mut Formatter<'_>, literal: &Literal) -> fmt::Result {
    match literal {
        Literal::Ellipsis => f.write_str("..."),
        Literal::None => f.write_str("None"),
        Literal::Bool(true) => f.write_str("True"),
        Literal::Bool(false) => f.write_str("False"),
        Literal::Int(i) => write!(f, "{i}"),
        Literal::LongInt(i) => write!(f, "{i}"),
        Literal::Float(v) if v.is_nan() => f.write_str("float('nan')"),
        Literal::Float(v) if v.is_infinite() => f.write_str(if *v > 0.0 { "1e999" } else { "-1e999" }),
        Literal::Float(v) => write!(f, "{v:?}"),
        Literal::Str(s) => write_str_repr(f, s),
        Literal::Bytes(bytes) => {
            f.write_str("b'")?;
            for &b in bytes {
                match b {
                    b'\\' => f.write_str("\\\\")?,
                    b'\'' => f.write_str("\\'")?,
                    b'\n' => f.write_str("\\n")?,
                    b'\r' => f.write_str("\\r")?,
                    b'\t' => f.write_str("\\t")?,
                    0x20..=0x7e => f.write_char(char::from(b))?,
                    _ => write!(f, "\\x{b:02x}")?,
                }
            }
            f.write_char('\'')
        }
    }
}

/// Python `repr` of a string, always single-quoted.
fn write_str_repr(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\x{:02x}", u32::from(c))?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('\'')
}
