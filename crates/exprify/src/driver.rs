//! Public interface for running lowering passes.

use std::sync::Arc;

use crate::{
    ast::{Module, Program},
    builtins::alias_definition,
    error::{DriverError, LowerError},
    injections::definitions_for,
    lower::Lowerer,
    names::NameGenerator,
    options::LowerOptions,
    tracer::{LowerTracer, NoopTracer},
};

/// Lowers modules to expression-only programs.
///
/// A compiler can run any number of passes. Each pass starts with empty scopes and an empty
/// injection set; the name generator is shared, so synthetic names never repeat across
/// passes, or across compilers created with the same generator through
/// [`with_name_generator`](Self::with_name_generator).
///
/// # Example
/// ```
/// use exprify::{Compiler, Expr, FunctionDef, LowerOptions, Module, Node, Operator};
///
/// let body = vec![Node::Return(Some(Expr::op(Expr::int(1), Operator::Add, Expr::int(1))))];
/// let module = Module { body: vec![Node::FunctionDef(FunctionDef::new("f", body))] };
/// let program = Compiler::new(LowerOptions::default()).compile(module).unwrap();
/// assert_eq!(program.to_string(), "f = lambda: 1 + 1\n");
/// ```
#[derive(Debug)]
pub struct Compiler<Tr: LowerTracer = NoopTracer> {
    options: LowerOptions,
    names: Arc<NameGenerator>,
    tracer: Tr,
}

impl Compiler<NoopTracer> {
    pub fn new(options: LowerOptions) -> Self {
        Self::with_tracer(options, NoopTracer)
    }
}

impl Default for Compiler<NoopTracer> {
    fn default() -> Self {
        Self::new(LowerOptions::default())
    }
}

impl<Tr: LowerTracer> Compiler<Tr> {
    /// Creates a compiler reporting lowering events to `tracer`.
    pub fn with_tracer(options: LowerOptions, tracer: Tr) -> Self {
        Self {
            options,
            names: Arc::new(NameGenerator::new()),
            tracer,
        }
    }

    /// Replaces the name generator, e.g. to share one between compilers on several threads
    /// or to use a different reserved prefix.
    #[must_use]
    pub fn with_name_generator(mut self, names: Arc<NameGenerator>) -> Self {
        self.names = names;
        self
    }

    pub fn options(&self) -> &LowerOptions {
        &self.options
    }

    pub fn name_generator(&self) -> &Arc<NameGenerator> {
        &self.names
    }

    pub fn tracer(&self) -> &Tr {
        &self.tracer
    }

    pub fn into_tracer(self) -> Tr {
        self.tracer
    }

    /// Lowers `module`.
    ///
    /// Identifiers using the reserved prefix are rejected before anything is lowered. The
    /// builtins alias and the support helpers the pass used come first in the output.
    ///
    /// # Errors
    /// Returns the first [`LowerError`] encountered; no partial output is produced.
    pub fn compile(&mut self, module: Module) -> Result<Program, LowerError> {
        self.names.check_module(&module)?;
        let lowerer = Lowerer::new(&self.names, &self.options, &mut self.tracer);
        let lowered = lowerer.lower_module(module)?;
        let mut body = definitions_for(&lowered.injections, &self.names);
        if body.is_empty() && lowered.uses_builtins {
            body.push(alias_definition(&self.names));
        }
        body.extend(lowered.body);
        Ok(Program { body })
    }

    /// Decodes a JSON-encoded [`Module`], lowers it and encodes the resulting [`Program`].
    ///
    /// # Errors
    /// Returns [`DriverError::Decode`] for malformed input, [`DriverError::Lower`] when
    /// lowering fails and [`DriverError::Encode`] if the output cannot be serialized.
    pub fn compile_json(&mut self, input: &str) -> Result<String, DriverError> {
        let module: Module = serde_json::from_str(input).map_err(DriverError::Decode)?;
        let program = self.compile(module)?;
        serde_json::to_string(&program).map_err(DriverError::Encode)
    }
}

/// Lowers `module` with default options and a fresh name generator.
///
/// # Errors
/// See [`Compiler::compile`].
pub fn compile(module: Module) -> Result<Program, LowerError> {
    Compiler::default().compile(module)
}
