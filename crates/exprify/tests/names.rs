/// Synthetic name generation: uniqueness, sharing between compilers and custom prefixes.
use std::{collections::HashSet, sync::Arc, thread};

use exprify::{Compiler, Expr, FunctionDef, LowerError, Module, NameGenerator, Node, compile};
use pretty_assertions::assert_eq;

/// `def f(): while g(): h()` needs exactly one synthetic name.
fn while_module() -> Module {
    let body = vec![Node::While {
        test: Expr::call(Expr::name("g"), Vec::new()),
        body: vec![Node::Expr(Expr::call(Expr::name("h"), Vec::new()))],
        or_else: Vec::new(),
    }];
    Module {
        body: vec![Node::FunctionDef(FunctionDef::new("f", body))],
    }
}

#[test]
fn names_never_repeat() {
    let names = NameGenerator::new();
    let generated: HashSet<String> = (0..10_000).map(|_| names.next_unique_name()).collect();
    assert_eq!(generated.len(), 10_000);
    assert!(generated.iter().all(|name| name.starts_with("__exprify_")));
}

/// One generator shared by several threads still hands out every name once.
#[test]
fn names_are_unique_across_threads() {
    let names = Arc::new(NameGenerator::new());
    let all: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| (0..1000).map(|_| names.next_unique_name()).collect::<Vec<_>>()))
            .collect();
        handles.into_iter().flat_map(|handle| handle.join().unwrap()).collect()
    });
    let unique: HashSet<&String> = all.iter().collect();
    assert_eq!(all.len(), 4000);
    assert_eq!(unique.len(), 4000);
}

/// Compilers sharing a generator continue each other's numbering.
#[test]
fn compilers_share_generator() {
    let names = Arc::new(NameGenerator::new());
    let mut first = Compiler::default().with_name_generator(Arc::clone(&names));
    let mut second = Compiler::default().with_name_generator(Arc::clone(&names));
    assert_eq!(
        first.compile(while_module()).unwrap().to_string(),
        "__exprify_builtins = __import__('builtins')\n\
         f = lambda: [[h() for __exprify_1 in __exprify_builtins.iter(lambda: __exprify_builtins.bool(g()), False)], None][-1]\n"
    );
    assert_eq!(
        second.compile(while_module()).unwrap().to_string(),
        "__exprify_builtins = __import__('builtins')\n\
         f = lambda: [[h() for __exprify_2 in __exprify_builtins.iter(lambda: __exprify_builtins.bool(g()), False)], None][-1]\n"
    );
    assert_eq!(names.next_unique_name(), "__exprify_3");
}

/// A fresh compiler starts counting from one.
#[test]
fn fresh_compiler_starts_at_one() {
    let program = compile(while_module()).unwrap();
    assert!(program.to_string().contains("for __exprify_1 in"));
}

#[test]
fn custom_prefix() {
    let names = Arc::new(NameGenerator::with_prefix("_t"));
    let mut compiler = Compiler::default().with_name_generator(names);
    let body = vec![Node::Raise {
        exc: Some(Expr::name("KeyError")),
        cause: None,
    }];
    let program = compiler
        .compile(Module {
            body: vec![Node::FunctionDef(FunctionDef::new("f", body))],
        })
        .unwrap();
    let text = program.to_string();
    assert!(text.starts_with("_tbuiltins = __import__('builtins')\n_tthrow = "), "{text}");
    assert!(text.contains("\n_traise = lambda exc, *cause: [(error := exc() if _tbuiltins.isinstance("), "{text}");
    assert!(text.ends_with("f = lambda: _traise(KeyError)\n"), "{text}");
}

/// The reserved prefix follows the generator's configuration.
#[test]
fn custom_prefix_is_reserved() {
    let mut compiler = Compiler::default().with_name_generator(Arc::new(NameGenerator::with_prefix("_t")));
    let err = compiler
        .compile(Module {
            body: vec![Node::Expr(Expr::name("_tmp"))],
        })
        .unwrap_err();
    assert_eq!(
        err,
        LowerError::ReservedIdentifier {
            name: "_tmp".to_owned(),
            prefix: "_t".to_owned(),
        }
    );
}
