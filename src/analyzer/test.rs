use super::*;
use crate::symbols::{RootEnv, ScopeArena};
use crate::utils::SourceId;
use crate::{combiner, lexer, macros, parser, resolver};
use pretty_assertions::assert_eq;

/// 辅助函数：运行到变量解析结束（要求没有错误），然后做一次检查。
fn check_source(source: &str) -> (ExprTree, ExprId, DiagnosticBag) {
    let env = RootEnv::standard();
    let mut tree = ExprTree::new();
    let mut diagnostics = DiagnosticBag::new();
    let lines = lexer::tokenize(source, SourceId::default(), None, &mut diagnostics);
    let root = parser::parse(lines, SourceId::default(), &env, &mut tree, &mut diagnostics);
    let mut keys = ScopeArena::new(env.root_keys(true));
    combiner::combine(root, &env, &mut tree, &mut keys, &mut diagnostics);
    macros::expand(root, &env, &mut tree, &mut diagnostics, Default::default());
    resolver::resolve(root, &env, &mut tree, &mut diagnostics);
    assert!(diagnostics.is_empty(), "errors before checking: {:?}", diagnostics.codes());
    check(root, &mut tree, &mut diagnostics);
    (tree, root, diagnostics)
}

fn check_errors(source: &str) -> Vec<String> {
    let (_, _, diagnostics) = check_source(source);
    diagnostics.codes().into_iter().map(String::from).collect()
}

fn assert_checks(source: &str) {
    let errors = check_errors(source);
    assert!(errors.is_empty(), "unexpected errors {errors:?} for source: {source}");
}

fn result_counts(tree: &ExprTree, root: ExprId) -> Vec<Option<usize>> {
    tree.descendants(root).into_iter().map(|id| tree.node(id).result_count).collect()
}

// --- 结果个数 ---

#[test]
fn test_counts_are_recorded_on_nodes() {
    let (tree, root, diagnostics) = check_source("var a = 1\nvar b = 2\n(a, b) = (b, a)");
    assert!(diagnostics.is_empty());
    let swap = tree.children(root)[2];
    assert_eq!(tree.node(swap).result_count, Some(2));
    assert_eq!(tree.node(tree.children(swap)[1]).result_count, Some(2));
    assert_eq!(tree.node(root).result_count, Some(0));
}

#[test]
fn test_if_with_else_is_a_value() {
    assert_checks("var x = if true\n  1\nelse\n  2");
    assert_checks("var x = if true\n  1\nelse if false\n  2\nelse\n  3");
}

#[test]
fn test_function_body_last_line_counts() {
    let (tree, root, diagnostics) = check_source("var f = fn (a, b)\n  a + b");
    assert!(diagnostics.is_empty());
    let function = tree.descendants(root).into_iter().find(|&id| tree.is(id, Builtin::Fn)).unwrap();
    let body = tree.children(function)[1];
    let last = *tree.children(body).last().unwrap();
    assert_eq!(tree.node(last).result_count, Some(1));
    assert_eq!(tree.node(function).result_count, Some(1));
}

#[test]
fn test_do_and_loop_values() {
    assert_checks("var x = do\n  if true\n    give 1\n  2");
    assert_checks("var x = loop i = 0\n  if i > 3\n    give i\n  next i + 1");
    assert_checks("loop\n  end");
}

#[test]
fn test_return_inside_function() {
    assert_checks("var f = fn x\n  return x");
}

#[test]
fn test_checking_is_idempotent() {
    let source = "var f = fn (a, b)\n  var c = do\n    if a\n      give b\n    a\n  c\nvar x = f(1, 2)";
    let (mut tree, root, diagnostics) = check_source(source);
    assert!(diagnostics.is_empty());
    let first = result_counts(&tree, root);

    let mut again = DiagnosticBag::new();
    check(root, &mut tree, &mut again);
    assert!(again.is_empty());
    assert_eq!(result_counts(&tree, root), first);
}

// --- 错误路径 ---

#[test]
fn test_if_without_else_used_as_value() {
    assert_eq!(check_errors("var x = if true\n  1"), vec!["E0206"]);
}

#[test]
fn test_statement_used_as_value() {
    assert_eq!(check_errors("var x = while true\n  1"), vec!["E0206"]);
}

#[test]
fn test_wrong_tuple_arity() {
    assert_eq!(check_errors("var a = 1\nvar b = 2\n(a, b) = 1"), vec!["E0207"]);
    assert_eq!(check_errors("loop (i, j) = (0, 1)\n  next i"), vec!["E0207"]);
}

#[test]
fn test_jumps_outside_their_target() {
    assert_eq!(check_errors("give 1"), vec!["E0204"]);
    assert_eq!(check_errors("end"), vec!["E0204"]);
    assert_eq!(check_errors("do\n  next"), vec!["E0204"]);
}

#[test]
fn test_return_outside_function() {
    assert_eq!(check_errors("return 1"), vec!["E0205"]);
}

#[test]
fn test_end_where_a_value_is_expected() {
    assert_eq!(check_errors("var x = do\n  end"), vec!["E0206"]);
}

#[test]
fn test_operand_count() {
    assert_eq!(check_errors("if true"), vec!["E0208"]);
}
