/// Tracer hooks observed during a lowering pass.
use exprify::{
    Compiler, ExceptHandler, Expr, FunctionDef, Injection, LowerOptions, Module, Node, ProfilingTracer,
    RecordingTracer, StderrTracer, TraceEvent, Try,
};
use pretty_assertions::assert_eq;

fn raising_module() -> Module {
    let body = vec![Node::Try(Try {
        body: vec![Node::Raise {
            exc: Some(Expr::call(Expr::name("ValueError"), vec![Expr::str("a")])),
            cause: None,
        }],
        handlers: vec![ExceptHandler {
            exc_type: Some(Expr::name("ValueError")),
            name: Some("e".to_owned()),
            body: vec![Node::Return(Some(Expr::call(Expr::name("str"), vec![Expr::name("e")])))],
        }],
        ..Try::default()
    })];
    Module {
        body: vec![Node::FunctionDef(FunctionDef::new("f", body))],
    }
}

#[test]
fn recording_tracer_events() {
    let mut compiler = Compiler::with_tracer(LowerOptions::default(), RecordingTracer::new());
    compiler.compile(raising_module()).unwrap();
    assert_eq!(
        compiler.into_tracer().into_events(),
        vec![
            TraceEvent::Statement {
                kind: "function_def",
                scope_depth: 0,
            },
            TraceEvent::ScopePush { depth: 1 },
            TraceEvent::Statement {
                kind: "try",
                scope_depth: 1,
            },
            TraceEvent::Injection(Injection::Throw),
            TraceEvent::Injection(Injection::Try),
            TraceEvent::SyntheticName("__exprify_1".to_owned()),
            TraceEvent::ShadowPush {
                dict: "__exprify_1".to_owned(),
                depth: 1,
            },
            TraceEvent::Statement {
                kind: "raise",
                scope_depth: 1,
            },
            TraceEvent::Injection(Injection::Raise),
            TraceEvent::SyntheticName("__exprify_2".to_owned()),
            TraceEvent::Statement {
                kind: "return",
                scope_depth: 1,
            },
            TraceEvent::ShadowPop {
                dict: "__exprify_1".to_owned(),
                depth: 0,
            },
            TraceEvent::ScopePop { depth: 0 },
        ]
    );
}

/// An injection is reported once per pass, however often it is used, including the helpers
/// other helpers call.
#[test]
fn injection_reported_once() {
    let mut module = raising_module();
    module.body.extend(raising_module().body);
    let mut compiler = Compiler::with_tracer(LowerOptions::default(), RecordingTracer::new());
    compiler.compile(module).unwrap();
    let injections: Vec<&TraceEvent> = compiler
        .tracer()
        .events()
        .iter()
        .filter(|event| matches!(event, TraceEvent::Injection(_)))
        .collect();
    assert_eq!(injections.len(), 3);
}

#[test]
fn profiling_report() {
    let mut compiler = Compiler::with_tracer(LowerOptions::default(), ProfilingTracer::new());
    compiler.compile(raising_module()).unwrap();
    let report = compiler.tracer().report();
    assert_eq!(
        report.statement_counts,
        vec![("function_def", 1), ("raise", 1), ("return", 1), ("try", 1)]
    );
    assert_eq!(report.max_scope_depth, 1);
    assert_eq!(report.max_shadow_depth, 1);
    assert_eq!(report.synthetic_names, 2);
}

/// The stderr tracer only prints; lowering output is unaffected.
#[test]
fn stderr_tracer_with_limit() {
    let mut compiler = Compiler::with_tracer(LowerOptions::default(), StderrTracer::with_limit(3));
    let program = compiler.compile(raising_module()).unwrap();
    assert_eq!(program.body.len(), 5);
}
