/// End-to-end lowering of small functions, checked against the exact printed output.
use exprify::{
    ExceptHandler, Expr, FunctionDef, LowerError, Module, Node, Operator, Program, TopLevel, Try, Unsupported, compile,
};
use pretty_assertions::assert_eq;

fn def(name: &str, body: Vec<Node>) -> Node {
    Node::FunctionDef(FunctionDef::new(name, body))
}

fn assign(name: &str, value: Expr) -> Node {
    Node::Assign {
        targets: vec![Expr::name(name)],
        value,
    }
}

fn lower(body: Vec<Node>) -> Result<Program, LowerError> {
    compile(Module { body })
}

/// `return 1 + 1` needs no sequence wrapper.
#[test]
fn single_return() {
    let body = vec![Node::Return(Some(Expr::op(Expr::int(1), Operator::Add, Expr::int(1))))];
    let program = lower(vec![def("f", body)]).unwrap();
    assert_eq!(program.to_string(), "f = lambda: 1 + 1\n");
}

/// Assignments become walrus bindings sequenced before the returned value.
#[test]
fn sequential_assignments() {
    let body = vec![
        assign("x", Expr::int(1)),
        assign("y", Expr::int(2)),
        Node::Return(Some(Expr::op(Expr::name("x"), Operator::Add, Expr::name("y")))),
    ];
    let program = lower(vec![def("f", body)]).unwrap();
    assert_eq!(program.to_string(), "f = lambda: [(x := 1), (y := 2), x + y][-1]\n");
}

/// A raise caught by a named handler goes through the shadow dictionary and both helpers.
#[test]
fn try_except_with_named_handler() {
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
    let program = lower(vec![def("f", body)]).unwrap();

    let helpers: Vec<String> = program.body[..4]
        .iter()
        .map(|item| match item {
            TopLevel::Assign { targets, .. } => targets[0].to_string(),
            TopLevel::Expr(expr) => panic!("expected helper definition, got {expr}"),
        })
        .collect();
    assert_eq!(
        helpers,
        ["__exprify_builtins", "__exprify_throw", "__exprify_raise", "__exprify_try"]
    );
    assert_eq!(program.body.len(), 5);
    assert_eq!(
        program.body[4].to_string(),
        "f = lambda: [(__exprify_1 := {'<result>': None}), \
         __exprify_try(lambda: __exprify_1.__setitem__('<result>', __exprify_raise(ValueError('a'))), \
         ((ValueError, lambda __exprify_2: [__exprify_1.__setitem__('e', __exprify_2), \
         __exprify_1.__setitem__('<result>', str(__exprify_1['e']))][-1]),), lambda: None, None), \
         (e := __exprify_1['e']) if 'e' in __exprify_1 else None, __exprify_1['<result>']][-1]"
    );
}

/// An accumulating `for` loop becomes a list comprehension whose walrus updates the local.
#[test]
fn accumulating_for_loop() {
    let body = vec![
        assign("s", Expr::int(0)),
        Node::For {
            target: Expr::name("i"),
            iter: Expr::call(Expr::name("range"), vec![Expr::int(3)]),
            body: vec![Node::AugAssign {
                target: Expr::name("s"),
                op: Operator::Add,
                value: Expr::name("i"),
            }],
            or_else: Vec::new(),
            is_async: false,
        },
        Node::Return(Some(Expr::name("s"))),
    ];
    let program = lower(vec![def("f", body)]).unwrap();
    assert_eq!(
        program.to_string(),
        "f = lambda: [(s := 0), [(s := s + i) for i in range(3)], s][-1]\n"
    );
}

/// `break` aborts the whole pass.
#[test]
fn break_is_rejected() {
    let body = vec![Node::For {
        target: Expr::name("i"),
        iter: Expr::name("items"),
        body: vec![Node::Break],
        or_else: Vec::new(),
        is_async: false,
    }];
    let err = lower(vec![def("f", body)]).unwrap_err();
    assert_eq!(err, LowerError::Unsupported(Unsupported::Break));
}

/// A function without `return` returns `None`.
#[test]
fn implicit_none_return() {
    let body = vec![Node::Expr(Expr::call(Expr::name("print"), vec![Expr::str("hi")]))];
    let program = lower(vec![def("f", body)]).unwrap();
    assert_eq!(program.to_string(), "f = lambda: [print('hi'), None][-1]\n");
}

/// A bare annotation has no runtime effect and disappears.
#[test]
fn bare_annotation_is_dropped() {
    let body = vec![
        Node::AnnAssign {
            target: Expr::name("x"),
            annotation: Expr::name("int"),
            value: None,
        },
        Node::AnnAssign {
            target: Expr::name("y"),
            annotation: Expr::name("int"),
            value: Some(Expr::int(4)),
        },
        Node::Return(Some(Expr::name("y"))),
    ];
    let program = lower(vec![def("f", body)]).unwrap();
    assert_eq!(program.to_string(), "f = lambda: [(y := 4), y][-1]\n");
}
