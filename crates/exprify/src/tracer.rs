//! Lowering trace hooks.
//!
//! The compiler is generic over a [`LowerTracer`], so observing a pass costs nothing when
//! the [`NoopTracer`] default is used: every hook is an empty inlined method.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (default) |
//! | [`StderrTracer`] | Human-readable lowering log to stderr |
//! | [`ProfilingTracer`] | Statement kind counters and nesting maxima |
//! | [`RecordingTracer`] | Full event recording for tests and post-mortem |
//!
//! ```ignore
//! let mut compiler = Compiler::with_tracer(LowerOptions::default(), RecordingTracer::new());
//! compiler.compile(module)?;
//! for event in compiler.tracer().events() { ... }
//! ```

use ahash::AHashMap;

use crate::injections::Injection;

/// Trace event emitted during lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A statement is about to be lowered.
    Statement {
        /// Statement kind, e.g. `"assign"` or `"try"`.
        kind: &'static str,
        /// Function nesting depth (0 at module level).
        scope_depth: usize,
    },
    /// A function or lambda body was entered.
    ScopePush { depth: usize },
    /// A function or lambda body was left.
    ScopePop { depth: usize },
    /// A `try` statement opened a shadow dictionary.
    ShadowPush {
        dict: String,
        /// Number of open shadow dictionaries in the current scope after the push.
        depth: usize,
    },
    ShadowPop { dict: String, depth: usize },
    /// A support construct was required for the first time in this pass.
    Injection(Injection),
    /// A synthetic identifier was minted.
    SyntheticName(String),
}

/// Trait for lowering tracing.
///
/// All methods have default no-op implementations; implementations only override the
/// hooks they care about.
pub trait LowerTracer: std::fmt::Debug {
    /// Called before each statement is lowered.
    #[inline(always)]
    fn on_statement(&mut self, _kind: &'static str, _scope_depth: usize) {}

    /// Called when a function or lambda scope is pushed.
    #[inline(always)]
    fn on_scope_push(&mut self, _depth: usize) {}

    /// Called when a function or lambda scope is popped.
    #[inline(always)]
    fn on_scope_pop(&mut self, _depth: usize) {}

    /// Called when a shadow dictionary is opened for a `try` statement.
    #[inline(always)]
    fn on_shadow_push(&mut self, _dict: &str, _depth: usize) {}

    /// Called when a shadow dictionary is closed.
    #[inline(always)]
    fn on_shadow_pop(&mut self, _dict: &str, _depth: usize) {}

    /// Called the first time a pass requires a support construct.
    #[inline(always)]
    fn on_injection(&mut self, _injection: Injection) {}

    /// Called for each synthetic identifier handed out.
    #[inline(always)]
    fn on_synthetic_name(&mut self, _name: &str) {}
}

// ============================================================================
// NoopTracer: zero-cost default
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl LowerTracer for NoopTracer {}

// ============================================================================
// StderrTracer: human-readable lowering log
// ============================================================================

/// Tracer that prints a human-readable lowering log to stderr.
///
/// Output format:
/// ```text
///   function_def            scope=0
///   >>> SCOPE               depth=1
///   try                     scope=1
///   +++ SHADOW __exprify_1  depth=1
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of lines to print. None = unlimited.
    limit: Option<usize>,
    count: usize,
    stopped: bool,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stderr tracer that stops after `limit` lines.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn emit(&mut self, line: std::fmt::Arguments<'_>) {
        if self.stopped {
            return;
        }
        eprintln!("{line}");
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} lines) ---");
            self.stopped = true;
        }
    }
}

impl LowerTracer for StderrTracer {
    fn on_statement(&mut self, kind: &'static str, scope_depth: usize) {
        self.emit(format_args!("  {kind:<22} scope={scope_depth}"));
    }

    fn on_scope_push(&mut self, depth: usize) {
        self.emit(format_args!("  >>> SCOPE              depth={depth}"));
    }

    fn on_scope_pop(&mut self, depth: usize) {
        self.emit(format_args!("  <<< SCOPE              depth={depth}"));
    }

    fn on_shadow_push(&mut self, dict: &str, depth: usize) {
        self.emit(format_args!("  +++ SHADOW {dict:<12} depth={depth}"));
    }

    fn on_shadow_pop(&mut self, dict: &str, depth: usize) {
        self.emit(format_args!("  --- SHADOW {dict:<12} depth={depth}"));
    }

    fn on_injection(&mut self, injection: Injection) {
        self.emit(format_args!("  *** INJECT {injection}"));
    }
}

// ============================================================================
// ProfilingTracer: statement counts and nesting maxima
// ============================================================================

/// Tracer that collects statistics about a lowering pass.
#[derive(Debug, Default)]
pub struct ProfilingTracer {
    statement_counts: AHashMap<&'static str, u64>,
    max_scope_depth: usize,
    max_shadow_depth: usize,
    synthetic_names: u64,
}

/// Summary report from a profiling trace.
#[derive(Debug)]
pub struct ProfilingReport {
    /// Per-kind statement counts, sorted by frequency (highest first).
    pub statement_counts: Vec<(&'static str, u64)>,
    pub max_scope_depth: usize,
    pub max_shadow_depth: usize,
    pub synthetic_names: u64,
}

impl ProfilingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statement counts are sorted by frequency, ties by name.
    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        let mut statement_counts: Vec<_> = self.statement_counts.iter().map(|(&k, &v)| (k, v)).collect();
        statement_counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ProfilingReport {
            statement_counts,
            max_scope_depth: self.max_scope_depth,
            max_shadow_depth: self.max_shadow_depth,
            synthetic_names: self.synthetic_names,
        }
    }
}

impl LowerTracer for ProfilingTracer {
    fn on_statement(&mut self, kind: &'static str, _scope_depth: usize) {
        *self.statement_counts.entry(kind).or_insert(0) += 1;
    }

    fn on_scope_push(&mut self, depth: usize) {
        self.max_scope_depth = self.max_scope_depth.max(depth);
    }

    fn on_shadow_push(&mut self, _dict: &str, depth: usize) {
        self.max_shadow_depth = self.max_shadow_depth.max(depth);
    }

    fn on_synthetic_name(&mut self, _name: &str) {
        self.synthetic_names += 1;
    }
}

// ============================================================================
// RecordingTracer: full event log
// ============================================================================

/// Tracer that records every event in order.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer and returns the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl LowerTracer for RecordingTracer {
    fn on_statement(&mut self, kind: &'static str, scope_depth: usize) {
        self.events.push(TraceEvent::Statement { kind, scope_depth });
    }

    fn on_scope_push(&mut self, depth: usize) {
        self.events.push(TraceEvent::ScopePush { depth });
    }

    fn on_scope_pop(&mut self, depth: usize) {
        self.events.push(TraceEvent::ScopePop { depth });
    }

    fn on_shadow_push(&mut self, dict: &str, depth: usize) {
        self.events.push(TraceEvent::ShadowPush {
            dict: dict.to_owned(),
            depth,
        });
    }

    fn on_shadow_pop(&mut self, dict: &str, depth: usize) {
        self.events.push(TraceEvent::ShadowPop {
            dict: dict.to_owned(),
            depth,
        });
    }

    fn on_injection(&mut self, injection: Injection) {
        self.events.push(TraceEvent::Injection(injection));
    }

    fn on_synthetic_name(&mut self, name: &str) {
        self.events.push(TraceEvent::SyntheticName(name.to_owned()));
    }
}
