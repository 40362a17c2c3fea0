#![doc = include_str!("../../../README.md")]

mod ast;
mod builtins;
mod driver;
mod error;
mod injections;
mod lower;
mod names;
mod options;
mod render;
mod scope;
pub mod tracer;

pub use crate::{
    ast::{
        Alias, BoolOperator, ClassDef, CmpOperator, Comprehension, DictItem, ExceptHandler, Expr, FunctionDef, Kwarg,
        Literal, Module, Node, Operator, Param, Parameters, Program, TopLevel, Try, UnaryOperator, WithItem,
    },
    driver::{Compiler, compile},
    error::{DriverError, LowerError, Unsupported},
    injections::{Injection, InjectionSet, definitions_for},
    names::{DEFAULT_PREFIX, NameGenerator},
    options::{DEFAULT_MAX_NESTING_DEPTH, LowerOptions},
    tracer::{LowerTracer, NoopTracer, ProfilingReport, ProfilingTracer, RecordingTracer, StderrTracer, TraceEvent},
};
