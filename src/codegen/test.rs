use super::ast::*;
use super::*;
use crate::symbols::{RootEnv, ScopeArena};
use crate::utils::SourceId;
use crate::{analyzer, combiner, lexer, macros, parser, resolver};
use pretty_assertions::assert_eq;

// --- Test Harness ---

/// 跑完整条管线，要求没有任何错误，返回生成的程序（带位置）。
fn generate_located(source: &str) -> Program {
    let env = RootEnv::standard();
    let mut tree = ExprTree::new();
    let mut diagnostics = DiagnosticBag::new();
    let lines = lexer::tokenize(source, SourceId::default(), None, &mut diagnostics);
    let root = parser::parse(lines, SourceId::default(), &env, &mut tree, &mut diagnostics);
    let mut keys = ScopeArena::new(env.root_keys(true));
    combiner::combine(root, &env, &mut tree, &mut keys, &mut diagnostics);
    macros::expand(root, &env, &mut tree, &mut diagnostics, Default::default());
    resolver::resolve(root, &env, &mut tree, &mut diagnostics);
    analyzer::check(root, &mut tree, &mut diagnostics);
    assert!(diagnostics.is_empty(), "errors before codegen: {:?}", diagnostics.codes());

    let program = generate(root, &tree, &mut diagnostics);
    assert!(diagnostics.is_empty(), "codegen errors: {:?}", diagnostics.codes());
    program.unwrap()
}

/// 只比较结构时用：去掉位置信息。
fn generate_source(source: &str) -> Program {
    generate_located(source).without_locations()
}

fn id(name: &str) -> Expr {
    Expr::ident(name)
}

fn num(value: f64) -> Expr {
    Expr::number(value)
}

fn call(callee: &str, args: Vec<Expr>) -> Stmt {
    Stmt::expr(Expr::call(id(callee), args))
}

fn decl(names: &[&str]) -> Stmt {
    Stmt::VarDecl(names.iter().map(|n| n.to_string()).collect())
}

fn block(stmts: Vec<Stmt>) -> Box<Stmt> {
    Box::new(Stmt::Block(stmts))
}

// --- Test Cases ---

#[test]
fn test_declarations_are_hoisted_into_one_statement() {
    let program = generate_source("var x = 1\nvar y = x + 2");
    assert_eq!(
        program.body,
        vec![
            decl(&["x", "y"]),
            Stmt::assign("x", num(1.0)),
            Stmt::assign("y", Expr::binary(BinaryOp::Add, id("x"), num(2.0))),
        ]
    );
}

#[test]
fn test_if_with_single_values_becomes_conditional() {
    let program = generate_source("#external c\nvar x = if c\n  1\nelse\n  2");
    let conditional = Expr::Conditional {
        test: Box::new(id("c")),
        consequent: Box::new(num(1.0)),
        alternate: Box::new(num(2.0)),
    };
    assert_eq!(program.body, vec![decl(&["x"]), Stmt::assign("x", conditional)]);
}

#[test]
fn test_if_statement() {
    let program = generate_source("#external f\nif f(1)\n  f(2)\n  f(3)");
    assert_eq!(
        program.body,
        vec![Stmt::If {
            test: Expr::call(id("f"), vec![num(1.0)]),
            consequent: block(vec![call("f", vec![num(2.0)]), call("f", vec![num(3.0)])]),
            alternate: None,
        }]
    );
}

#[test]
fn test_do_with_give_is_a_labeled_block() {
    let program = generate_source("#external a\nvar x = do\n  if a\n    give 1\n  2");
    assert_eq!(
        program.body,
        vec![
            decl(&["x"]),
            Stmt::Labeled {
                label: "do$1".into(),
                body: block(vec![
                    Stmt::If {
                        test: id("a"),
                        consequent: block(vec![Stmt::assign("x", num(1.0)), Stmt::Break(Some("do$1".into()))]),
                        alternate: None,
                    },
                    Stmt::assign("x", num(2.0)),
                ]),
            },
        ]
    );
}

#[test]
fn test_loop_with_give_and_next() {
    let program = generate_source("var n = loop i = 0\n  if i > 3\n    give i\n  next i + 1");
    let label = || Some("loop$1".to_string());
    assert_eq!(
        program.body,
        vec![
            decl(&["n"]),
            Stmt::Block(vec![
                decl(&["i"]),
                Stmt::assign("i", num(0.0)),
                Stmt::Labeled {
                    label: "loop$1".into(),
                    body: Box::new(Stmt::While {
                        test: Expr::Literal(Literal::Bool(true)),
                        body: block(vec![
                            Stmt::If {
                                test: Expr::binary(BinaryOp::Gt, id("i"), num(3.0)),
                                consequent: block(vec![Stmt::assign("n", id("i")), Stmt::Break(label())]),
                                alternate: None,
                            },
                            Stmt::assign("i", Expr::binary(BinaryOp::Add, id("i"), num(1.0))),
                            Stmt::Continue(label()),
                        ]),
                    }),
                },
            ]),
        ]
    );
}

#[test]
fn test_function_returns_its_last_value() {
    let program = generate_source("var f = fn (a, b)\n  a + b");
    let function = Expr::Function {
        params: vec!["a".into(), "b".into()],
        body: vec![Stmt::Return(Some(Expr::binary(BinaryOp::Add, id("a"), id("b"))))],
    };
    assert_eq!(program.body, vec![decl(&["f"]), Stmt::assign("f", function)]);
}

#[test]
fn test_tuple_assignment_goes_through_temporaries() {
    let program = generate_source("var a = 1\nvar b = 2\n(a, b) = (b, a)");
    assert_eq!(
        program.body,
        vec![
            decl(&["a", "b", "$t1", "$t2"]),
            Stmt::assign("a", num(1.0)),
            Stmt::assign("b", num(2.0)),
            Stmt::assign("$t1", id("b")),
            Stmt::assign("$t2", id("a")),
            Stmt::assign("a", id("$t1")),
            Stmt::assign("b", id("$t2")),
        ]
    );
}

#[test]
fn test_earlier_operands_are_spilled() {
    let program = generate_source("var a = 1\nvar y = a + do\n  a = 2\n  a");
    assert_eq!(
        program.body,
        vec![
            decl(&["a", "y", "$t1", "$t2"]),
            Stmt::assign("a", num(1.0)),
            Stmt::assign("$t1", id("a")),
            Stmt::Block(vec![Stmt::assign("a", num(2.0)), Stmt::assign("$t2", id("a"))]),
            Stmt::assign("y", Expr::binary(BinaryOp::Add, id("$t1"), id("$t2"))),
        ]
    );
}

#[test]
fn test_short_circuit_with_statements_on_the_right() {
    let program = generate_source("#external a\nvar x = a and do\n  1");
    assert_eq!(
        program.body,
        vec![
            decl(&["x", "$t1", "$t2"]),
            Stmt::assign("$t1", id("a")),
            Stmt::If {
                test: id("$t1"),
                consequent: block(vec![
                    Stmt::Block(vec![Stmt::assign("$t2", num(1.0))]),
                    Stmt::assign("$t1", id("$t2")),
                ]),
                alternate: None,
            },
            Stmt::assign("x", id("$t1")),
        ]
    );
}

#[test]
fn test_while_loop() {
    let program = generate_source("var i = 0\nwhile i < 3\n  i = i + 1");
    assert_eq!(
        program.body,
        vec![
            decl(&["i"]),
            Stmt::assign("i", num(0.0)),
            Stmt::While {
                test: Expr::binary(BinaryOp::Lt, id("i"), num(3.0)),
                body: block(vec![Stmt::assign("i", Expr::binary(BinaryOp::Add, id("i"), num(1.0)))]),
            },
        ]
    );
}

#[test]
fn test_try_catch_finally() {
    let program = generate_source("#external f\ntry\n  f(1)\ncatch e\n  f(e)\nfinally\n  f(2)");
    assert_eq!(
        program.body,
        vec![Stmt::Try {
            block: vec![call("f", vec![num(1.0)])],
            handler: Some(CatchClause {
                param: Some("e".into()),
                body: vec![call("f", vec![id("e")])],
            }),
            finalizer: Some(vec![call("f", vec![num(2.0)])]),
        }]
    );
}

#[test]
fn test_member_shorthand() {
    let program = generate_source("@name");
    assert_eq!(
        program.body,
        vec![Stmt::expr(Expr::Member {
            object: Box::new(id("this")),
            property: Box::new(id("name")),
            computed: false,
        })]
    );
}

#[test]
fn test_internal_errors_become_diagnostics() {
    let error = CodegenError::Unsupported {
        what: "<paren>".into(),
        loc: crate::utils::Loc::clamped(SourceId::default(), 1, 0),
    };
    let diagnostic = error.into_diagnostic();
    assert_eq!(diagnostic.code(), "E0400");
    assert_eq!(diagnostic.message(), "cannot generate code for `<paren>`");
}

#[test]
fn test_declaration_in_single_line_catch_is_kept() {
    let program = generate_source("#external f\ntry\n  f(1)\ncatch e var y = e\nfinally\n  f(2)");
    assert_eq!(
        program.body,
        vec![Stmt::Try {
            block: vec![call("f", vec![num(1.0)])],
            handler: Some(CatchClause {
                param: Some("e".into()),
                body: vec![decl(&["y"]), Stmt::assign("y", id("e"))],
            }),
            finalizer: Some(vec![call("f", vec![num(2.0)])]),
        }]
    );
}

#[test]
fn test_statements_and_expressions_carry_source_locations() {
    let program = generate_located("var x = 1\nx = x + 2");
    let spans: Vec<_> = program.body.iter().map(Stmt::span).collect();
    // 合成的声明没有位置，每一行生成的语句指回那一行
    assert_eq!(spans[0], None);
    assert_eq!(spans[1].map(|span| span.loc.line()), Some(1));
    assert_eq!(spans[2].map(|span| span.loc.line()), Some(2));

    let Stmt::Located(_, stmt) = &program.body[2] else { panic!("expected a located statement") };
    let Stmt::Expr(Expr::Located(_, assign)) = stmt.as_ref() else { panic!("expected a located expression") };
    let Expr::Assign { value, .. } = assign.as_ref() else { panic!("expected an assignment") };
    let Expr::Located(_, sum) = value.as_ref() else { panic!("expected a located sum") };
    let Expr::Binary { right, .. } = sum.as_ref() else { panic!("expected a binary expression") };
    let span = right.span().expect("literal has a location");
    assert_eq!((span.loc.line(), span.loc.column()), (2, 8));
    assert_eq!(span.origin, None);
}

#[test]
fn test_expanded_code_maps_to_template_and_invocation() {
    let program = generate_located("#external f\n#macro m x #quote\n  f(#unquote x)\n\nm 1");
    let [stmt] = &program.body[..] else { panic!("expected one statement") };
    let span = stmt.span().expect("expanded statement has a location");
    assert_eq!(span.loc.line(), 3);
    assert_eq!(span.origin.map(|origin| origin.line()), Some(5));
}
