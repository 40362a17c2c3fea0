/// Assignments, imports, classes and module-level statements.
use exprify::{
    Alias, ClassDef, Compiler, Expr, FunctionDef, Kwarg, Literal, LowerOptions, Module, Node, Operator, Param,
    Parameters, compile,
};
use pretty_assertions::assert_eq;

/// First line of every program that calls a builtin.
const ALIAS: &str = "__exprify_builtins = __import__('builtins')\n";

fn lower(body: Vec<Node>) -> String {
    compile(Module { body }).unwrap().to_string()
}

fn lower_f(params: &[&str], body: Vec<Node>) -> String {
    let def = FunctionDef::new("f", body).with_params(Parameters::positional(params.iter().copied()));
    lower(vec![Node::FunctionDef(def)])
}

fn assign(target: Expr, value: Expr) -> Node {
    Node::Assign {
        targets: vec![target],
        value,
    }
}

fn ret(value: Expr) -> Node {
    Node::Return(Some(value))
}

/// Unpacking materialises the value once and checks its length before binding.
#[test]
fn tuple_unpacking() {
    let body = vec![
        assign(
            Expr::Tuple(vec![
                Expr::name("a"),
                Expr::Tuple(vec![Expr::name("b"), Expr::name("c")]),
            ]),
            Expr::name("p"),
        ),
        ret(Expr::name("a")),
    ];
    let text = lower_f(&["p"], body);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3, "{text}");
    assert_eq!(lines[0], ALIAS.trim_end());
    assert!(lines[1].starts_with("__exprify_throw = "));
    assert_eq!(
        lines[2],
        "f = lambda p: [[(__exprify_1 := __exprify_builtins.tuple(p)), \
         __exprify_throw(__exprify_builtins.ValueError('too many values to unpack (expected 2)' \
         if __exprify_builtins.len(__exprify_1) > 2 else 'not enough values to unpack (expected 2, got %d)' \
         % __exprify_builtins.len(__exprify_1))) if __exprify_builtins.len(__exprify_1) != 2 else None, \
         (a := __exprify_1[0]), [(__exprify_2 := __exprify_builtins.tuple(__exprify_1[1])), \
         __exprify_throw(__exprify_builtins.ValueError('too many values to unpack (expected 2)' \
         if __exprify_builtins.len(__exprify_2) > 2 else 'not enough values to unpack (expected 2, got %d)' \
         % __exprify_builtins.len(__exprify_2))) if __exprify_builtins.len(__exprify_2) != 2 else None, \
         (b := __exprify_2[0]), (c := __exprify_2[1])]], a][-1]"
    );
}

/// `a = b = g()` evaluates `g()` once.
#[test]
fn chained_assignment() {
    let body = vec![
        Node::Assign {
            targets: vec![Expr::name("a"), Expr::name("b")],
            value: Expr::call(Expr::name("g"), Vec::new()),
        },
        ret(Expr::op(Expr::name("a"), Operator::Add, Expr::name("b"))),
    ];
    assert_eq!(
        lower_f(&[], body),
        "f = lambda: [[(__exprify_1 := g()), (a := __exprify_1), (b := __exprify_1)], a + b][-1]\n"
    );
}

#[test]
fn attribute_and_subscript_targets() {
    let body = vec![
        assign(Expr::attr(Expr::name("o"), "x"), Expr::int(1)),
        Node::AugAssign {
            target: Expr::attr(Expr::name("o"), "n"),
            op: Operator::Add,
            value: Expr::int(1),
        },
        assign(Expr::subscript(Expr::name("d"), Expr::name("k")), Expr::name("v")),
        Node::AugAssign {
            target: Expr::subscript(Expr::name("d"), Expr::name("k")),
            op: Operator::Sub,
            value: Expr::int(1),
        },
    ];
    assert_eq!(
        lower_f(&["o", "d", "k", "v"], body),
        format!(
            "{ALIAS}f = lambda o, d, k, v: [__exprify_builtins.setattr(o, 'x', 1), \
             __exprify_builtins.setattr(o, 'n', o.n + 1), d.__setitem__(k, v), d.__setitem__(k, d[k] - 1), None][-1]\n"
        )
    );
}

/// A user walrus keeps its value.
#[test]
fn user_walrus() {
    let body = vec![ret(Expr::op(
        Expr::named("n", Expr::int(5)),
        Operator::Add,
        Expr::name("n"),
    ))];
    assert_eq!(lower_f(&[], body), "f = lambda: (n := 5) + n\n");
}

#[test]
fn module_level_statements_stay_statements() {
    let body = vec![
        assign(Expr::name("x"), Expr::int(1)),
        Node::AnnAssign {
            target: Expr::name("y"),
            annotation: Expr::name("int"),
            value: Some(Expr::int(2)),
        },
        Node::Assign {
            targets: vec![Expr::name("a"), Expr::name("b")],
            value: Expr::int(0),
        },
        assign(
            Expr::Tuple(vec![Expr::name("c"), Expr::Starred(Box::new(Expr::name("d")))]),
            Expr::name("xs"),
        ),
        Node::Expr(Expr::call(
            Expr::name("print"),
            vec![Expr::op(Expr::name("x"), Operator::Add, Expr::name("y"))],
        )),
        Node::FunctionDef(FunctionDef::new("g", vec![ret(Expr::name("x"))])),
    ];
    assert_eq!(
        lower(body),
        "x = 1\ny = 2\na = b = 0\n(c, *d) = xs\nprint(x + y)\ng = lambda: x\n"
    );
}

/// Decorators are applied innermost first; annotations are dropped and defaults kept.
#[test]
fn function_signature_and_decorators() {
    let mut def = FunctionDef::new("h", vec![ret(Expr::name("a"))]);
    def.params = Parameters {
        posonly: Vec::new(),
        args: vec![
            Param {
                annotation: Some(Expr::name("int")),
                ..Param::new("a")
            },
            Param::new("b").with_default(Expr::int(1)),
        ],
        vararg: Some(Param::new("args")),
        kwonly: vec![Param::new("c")],
        kwarg: Some(Param::new("kw")),
    };
    def.decorators = vec![Expr::name("outer"), Expr::name("inner")];
    def.returns = Some(Expr::name("int"));
    assert_eq!(
        lower(vec![Node::FunctionDef(def)]),
        "h = outer(inner(lambda a, b=1, *args, c, **kw: a))\n"
    );
}

/// A nested `def` becomes a binding inside the enclosing body.
#[test]
fn nested_function() {
    let inner = FunctionDef::new("g", vec![ret(Expr::int(1))]);
    let body = vec![
        Node::FunctionDef(inner),
        ret(Expr::call(Expr::name("g"), Vec::new())),
    ];
    assert_eq!(lower_f(&[], body), "f = lambda: [(g := lambda: 1), g()][-1]\n");
}

#[test]
fn imports() {
    let body = vec![
        Node::Import {
            names: vec![Alias::new("os.path", None)],
        },
        Node::Import {
            names: vec![Alias::new("os.path", Some("osp"))],
        },
        Node::Import {
            names: vec![Alias::new("json", None), Alias::new("re", None)],
        },
        Node::ImportFrom {
            module: Some("math".to_owned()),
            names: vec![Alias::new("pi", None)],
            level: 0,
        },
    ];
    assert_eq!(
        lower(body),
        format!(
            "{ALIAS}(os := __exprify_builtins.__import__('os.path'))\n\
             (osp := __exprify_builtins.getattr(__exprify_builtins.__import__('os.path'), 'path'))\n\
             [(json := __exprify_builtins.__import__('json')), (re := __exprify_builtins.__import__('re'))][-1]\n\
             (pi := __exprify_builtins.getattr(__exprify_builtins.__import__('math', fromlist=('pi',)), 'pi'))\n"
        )
    );
}

/// `from m import a, b` loads the module once.
#[test]
fn from_import_several_names() {
    let body = vec![Node::ImportFrom {
        module: Some("collections".to_owned()),
        names: vec![Alias::new("OrderedDict", Some("OD")), Alias::new("deque", None)],
        level: 0,
    }];
    assert_eq!(
        lower(body),
        format!(
            "{ALIAS}[(__exprify_1 := __exprify_builtins.__import__('collections', fromlist=('OrderedDict', 'deque'))), \
             (OD := __exprify_builtins.getattr(__exprify_1, 'OrderedDict')), \
             (deque := __exprify_builtins.getattr(__exprify_1, 'deque'))][-1]\n"
        )
    );
}

fn point_class() -> ClassDef {
    let mut norm = FunctionDef::new("norm", vec![ret(Expr::attr(Expr::name("self"), "x"))]);
    norm.params = Parameters::positional(["self"]);
    ClassDef::new(
        "Point",
        vec![
            Node::Expr(Expr::Literal(Literal::Str("A point.".to_owned()))),
            assign(Expr::name("dims"), Expr::int(2)),
            Node::FunctionDef(norm),
        ],
    )
}

#[test]
fn class_members() {
    assert_eq!(
        lower(vec![Node::ClassDef(point_class())]),
        format!(
            "{ALIAS}(Point := __exprify_builtins.type('Point', (), \
             {{'__doc__': 'A point.', 'dims': 2, 'norm': lambda self: self.x}}))\n"
        )
    );
}

/// Declared bases are dropped by default.
#[test]
fn class_bases_are_dropped() {
    let mut class = point_class();
    class.bases = vec![Expr::name("Base")];
    class.decorators = vec![Expr::name("register")];
    assert_eq!(
        lower(vec![Node::ClassDef(class)]),
        format!(
            "{ALIAS}(Point := register(__exprify_builtins.type('Point', (), \
             {{'__doc__': 'A point.', 'dims': 2, 'norm': lambda self: self.x}})))\n"
        )
    );
}

#[test]
fn class_bases_kept_on_request() {
    let mut class = ClassDef::new("B", vec![assign(Expr::name("x"), Expr::int(1))]);
    class.bases = vec![Expr::name("A")];
    class.keywords = vec![Kwarg {
        name: Some("metaclass".to_owned()),
        value: Expr::name("Meta"),
    }];
    let program = Compiler::new(LowerOptions::default().keep_class_bases(true))
        .compile(Module {
            body: vec![Node::ClassDef(class)],
        })
        .unwrap();
    assert_eq!(program.to_string(), "(B := Meta('B', (A,), {'x': 1}))\n");
}

/// `a = b = mk()` in a class body makes both members the same object.
#[test]
fn class_chained_assignment_shares_value() {
    let class = ClassDef::new(
        "C",
        vec![Node::Assign {
            targets: vec![Expr::name("a"), Expr::name("b")],
            value: Expr::call(Expr::name("mk"), Vec::new()),
        }],
    );
    assert_eq!(
        lower(vec![Node::ClassDef(class)]),
        format!("{ALIAS}(C := __exprify_builtins.type('C', (), {{'a': (__exprify_1 := mk()), 'b': __exprify_1}}))\n")
    );
}
