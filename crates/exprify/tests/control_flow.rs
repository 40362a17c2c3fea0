/// Lowering of conditionals, loops and `with` blocks.
use exprify::{CmpOperator, Comprehension, Expr, FunctionDef, Module, Node, Operator, Parameters, WithItem, compile};
use pretty_assertions::assert_eq;

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::name(name), args)
}

fn ret(value: Expr) -> Node {
    Node::Return(Some(value))
}

/// First line of every program that calls a builtin.
const ALIAS: &str = "__exprify_builtins = __import__('builtins')\n";

/// Lowers `def f(params): body` and returns the printed program.
fn lower_f(params: &[&str], body: Vec<Node>) -> String {
    let def = FunctionDef::new("f", body).with_params(Parameters::positional(params.iter().copied()));
    compile(Module {
        body: vec![Node::FunctionDef(def)],
    })
    .unwrap()
    .to_string()
}

#[test]
fn if_else_in_tail_position() {
    let body = vec![Node::If {
        test: Expr::name("x"),
        body: vec![ret(Expr::int(1))],
        or_else: vec![ret(Expr::int(2))],
    }];
    assert_eq!(lower_f(&["x"], body), "f = lambda x: 1 if x else 2\n");
}

/// A missing `else` in tail position returns `None`.
#[test]
fn if_without_else_in_tail_position() {
    let body = vec![Node::If {
        test: Expr::name("x"),
        body: vec![ret(Expr::int(1))],
        or_else: Vec::new(),
    }];
    assert_eq!(lower_f(&["x"], body), "f = lambda x: 1 if x else None\n");
}

#[test]
fn conditional_binding() {
    let body = vec![
        Node::If {
            test: Expr::name("x"),
            body: vec![Node::Assign {
                targets: vec![Expr::name("y")],
                value: Expr::int(1),
            }],
            or_else: Vec::new(),
        },
        ret(Expr::name("y")),
    ];
    assert_eq!(lower_f(&["x"], body), "f = lambda x: [(y := 1) if x else None, y][-1]\n");
}

/// The condition is re-evaluated through a predicate thunk before every iteration.
#[test]
fn while_loop() {
    let body = vec![
        Node::Assign {
            targets: vec![Expr::name("i")],
            value: Expr::int(0),
        },
        Node::While {
            test: Expr::compare(Expr::name("i"), CmpOperator::Lt, Expr::name("n")),
            body: vec![Node::AugAssign {
                target: Expr::name("i"),
                op: Operator::Add,
                value: Expr::int(1),
            }],
            or_else: Vec::new(),
        },
        ret(Expr::name("i")),
    ];
    assert_eq!(
        lower_f(&["n"], body),
        format!(
            "{ALIAS}f = lambda n: [(i := 0), [(i := i + 1) for __exprify_1 in \
             __exprify_builtins.iter(lambda: __exprify_builtins.bool(i < n), False)], i][-1]\n"
        )
    );
}

/// Without `break`, a loop's `else` body always runs after the loop.
#[test]
fn for_else() {
    let body = vec![Node::For {
        target: Expr::name("x"),
        iter: Expr::name("xs"),
        body: vec![Node::Expr(call("g", vec![Expr::name("x")]))],
        or_else: vec![Node::Expr(call("h", Vec::new()))],
        is_async: false,
    }];
    assert_eq!(
        lower_f(&["xs"], body),
        "f = lambda xs: [[[g(x) for x in xs], h()][-1], None][-1]\n"
    );
}

#[test]
fn for_with_tuple_target() {
    let body = vec![Node::For {
        target: Expr::Tuple(vec![Expr::name("k"), Expr::name("v")]),
        iter: Expr::name("items"),
        body: vec![Node::Assign {
            targets: vec![Expr::subscript(Expr::name("d"), Expr::name("k"))],
            value: Expr::name("v"),
        }],
        or_else: Vec::new(),
        is_async: false,
    }];
    assert_eq!(
        lower_f(&["d", "items"], body),
        "f = lambda d, items: [[d.__setitem__(k, v) for (k, v) in items], None][-1]\n"
    );
}

/// A walrus cannot appear in a comprehension iterable, so the iterable is bound first.
#[test]
fn for_iterable_with_walrus_is_hoisted() {
    let body = vec![Node::For {
        target: Expr::name("x"),
        iter: Expr::named("ys", call("g", Vec::new())),
        body: vec![Node::Expr(call("h", vec![Expr::name("x")]))],
        or_else: Vec::new(),
        is_async: false,
    }];
    assert_eq!(
        lower_f(&[], body),
        "f = lambda: [[(__exprify_1 := (ys := g())), [h(x) for x in __exprify_1]][-1], None][-1]\n"
    );
}

/// `with` enters the manager, binds the alias and exits after the body; the body's value
/// is the value of the whole block.
#[test]
fn with_block() {
    let body = vec![Node::With {
        items: vec![WithItem {
            context_expr: call("open", vec![Expr::name("p")]),
            optional_vars: Some(Expr::name("fh")),
        }],
        body: vec![ret(Expr::method_call(Expr::name("fh"), "read", Vec::new()))],
        is_async: false,
    }];
    assert_eq!(
        lower_f(&["p"], body),
        format!(
            "{ALIAS}f = lambda p: [(fh := __exprify_builtins.getattr((__exprify_1 := open(p)), '__enter__')()), \
             fh.read(), __exprify_builtins.getattr(__exprify_1, '__exit__')(None, None, None)][1]\n"
        )
    );
}

/// Managers are exited in declaration order.
#[test]
fn with_several_items() {
    let body = vec![Node::With {
        items: vec![
            WithItem {
                context_expr: Expr::name("a"),
                optional_vars: None,
            },
            WithItem {
                context_expr: Expr::name("b"),
                optional_vars: None,
            },
        ],
        body: vec![Node::Expr(call("g", Vec::new()))],
        is_async: false,
    }];
    assert_eq!(
        lower_f(&["a", "b"], body),
        format!(
            "{ALIAS}f = lambda a, b: [__exprify_builtins.getattr((__exprify_1 := a), '__enter__')(), \
             __exprify_builtins.getattr((__exprify_2 := b), '__enter__')(), [g(), None][-1], \
             __exprify_builtins.getattr(__exprify_1, '__exit__')(None, None, None), \
             __exprify_builtins.getattr(__exprify_2, '__exit__')(None, None, None)][2]\n"
        )
    );
}

/// User comprehensions and lambdas keep their own scopes.
#[test]
fn comprehension_and_lambda_pass_through() {
    let squares = Expr::ListComp {
        elt: Box::new(Expr::op(Expr::name("v"), Operator::Mult, Expr::name("v"))),
        generators: vec![Comprehension {
            target: Expr::name("v"),
            iter: Expr::name("xs"),
            ifs: vec![Expr::name("v")],
            is_async: false,
        }],
    };
    let body = vec![ret(Expr::call(
        Expr::lambda(Parameters::positional(["ys"]), Expr::name("ys")),
        vec![squares],
    ))];
    assert_eq!(
        lower_f(&["xs"], body),
        "f = lambda xs: (lambda ys: ys)([v * v for v in xs if v])\n"
    );
}
