use super::*;
use crate::lexer;
use crate::parser;
use crate::utils::SourceId;
use pretty_assertions::assert_eq;

/// 辅助函数：词法分析、块结构分析和组合，返回组合后的树和错误码。
fn combine_source(source: &str) -> (ExprTree, ExprId, Vec<String>) {
    let env = RootEnv::standard();
    let mut tree = ExprTree::new();
    let mut diagnostics = DiagnosticBag::new();
    let lines = lexer::tokenize(source, SourceId::default(), None, &mut diagnostics);
    let root = parser::parse(lines, SourceId::default(), &env, &mut tree, &mut diagnostics);
    let mut keys = ScopeArena::new(env.root_keys(true));
    combine(root, &env, &mut tree, &mut keys, &mut diagnostics);
    assert!(tree.is_consistent(root));
    let codes = diagnostics.codes().into_iter().map(String::from).collect();
    (tree, root, codes)
}

fn combine_ok(source: &str) -> String {
    let (tree, root, errors) = combine_source(source);
    assert!(errors.is_empty(), "unexpected errors {errors:?} for source: {source}");
    tree.sexpr(root)
}

fn combine_errors(source: &str) -> Vec<String> {
    combine_source(source).2
}

// --- 优先级与结合性 ---

#[test]
fn test_precedence_climbing() {
    assert_eq!(combine_ok("x + 3 * 5"), "(<root> (+ x (* 3 5)))");
    assert_eq!(combine_ok("x * 3 + 5"), "(<root> (+ (* x 3) 5))");
}

#[test]
fn test_left_associative_operators() {
    assert_eq!(combine_ok("x + y + z"), "(<root> (+ (+ x y) z))");
}

#[test]
fn test_assignment_is_right_associative() {
    assert_eq!(combine_ok("a = b = 1"), "(<root> (= a (= b 1)))");
}

#[test]
fn test_prefix_minus_becomes_negation() {
    assert_eq!(combine_ok("x + - y"), "(<root> (+ x (neg y)))");
    assert_eq!(combine_ok("- x * y"), "(<root> (* (neg x) y))");
}

#[test]
fn test_word_operators_are_aliases() {
    assert_eq!(combine_ok("a or b and not c"), "(<root> (|| a (&& b (! c))))");
}

#[test]
fn test_member_binds_tighter_than_call() {
    assert_eq!(combine_ok("a.b(c)"), "(<root> (<call> (. a b) c))");
}

// --- 调用、下标与字面量 ---

#[test]
fn test_bracket_calls_and_elements() {
    assert_eq!(combine_ok("a(b)"), "(<root> (<call> a b))");
    assert_eq!(combine_ok("a[b]"), "(<root> (<element> a b))");
    assert_eq!(combine_ok("f(x, y)"), "(<root> (<call> f x y))");
}

#[test]
fn test_implicit_call_nests_to_the_right() {
    assert_eq!(combine_ok("a b c"), "(<root> (<call> a (<call> b c)))");
    assert_eq!(combine_ok("f x + 1"), "(<root> (+ (<call> f x) 1))");
}

#[test]
fn test_tuples_arrays_and_objects() {
    assert_eq!(combine_ok("(1, 2)"), "(<root> (<tuple> 1 2))");
    assert_eq!(combine_ok("[1, 2, 3]"), "(<root> (<array> 1 2 3))");
    assert_eq!(combine_ok("{a: 1, \"b\": 2}"), "(<root> (<object> (: a 1) (: \"b\" 2)))");
}

#[test]
fn test_line_level_comma_makes_a_tuple() {
    assert_eq!(combine_ok("a, b = 1, 2"), "(<root> (<tuple> a (= b 1) 2))");
}

#[test]
fn test_literal_keywords() {
    assert_eq!(combine_ok("x = true"), "(<root> (= x true))");
    assert_eq!(combine_ok("x = null"), "(<root> (= x null))");
}

// --- 关键字与从属子句 ---

#[test]
fn test_if_else_across_lines() {
    let source = "if x\n  y\nelse\n  z";
    assert_eq!(
        combine_ok(source),
        "(<root> (if x (<block> y) (else (<block> z))))"
    );
}

#[test]
fn test_else_if_chain_attaches_to_innermost_if() {
    let source = "if a\n  b\nelse if c\n  d\nelse\n  e";
    assert_eq!(
        combine_ok(source),
        "(<root> (if a (<block> b) (else (if c (<block> d) (else (<block> e))))))"
    );
}

#[test]
fn test_try_catch_finally() {
    let source = "try\n  a\ncatch e\n  b\nfinally\n  c";
    assert_eq!(
        combine_ok(source),
        "(<root> (try (<block> a) (catch e (<block> b)) (finally (<block> c))))"
    );
}

#[test]
fn test_var_declares_its_tag() {
    let (tree, root, errors) = combine_source("var x = 1");
    assert!(errors.is_empty());
    assert_eq!(tree.sexpr(root), "(<root> (= (var x) 1))");

    let assign = tree.children(root)[0];
    let var = tree.children(assign)[0];
    let target = tree.children(var)[0];
    let kind = tree.tag_kind(target).unwrap();
    assert!(kind.is_declaration());
    assert!(!kind.is_constant());
}

#[test]
fn test_const_and_external_tags() {
    let (tree, root, _) = combine_source("const k = 1\n#external console");
    let statements = tree.children(root).to_vec();

    let constant = tree.children(tree.children(statements[0])[0])[0];
    assert!(tree.tag_kind(constant).unwrap().is_constant());

    let external = tree.children(statements[1])[0];
    assert_eq!(tree.tag_kind(external), Some(TagKind::External));
}

#[test]
fn test_fn_declares_parameters() {
    let (tree, root, errors) = combine_source("f = fn (a, b)\n  a + b");
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(tree.sexpr(root), "(<root> (= f (fn (<tuple> a b) (<block> (+ a b)))))");

    let function = tree.children(tree.children(root)[0])[1];
    let params = tree.children(function)[0];
    for &param in tree.children(params) {
        assert!(tree.tag_kind(param).unwrap().is_declaration());
    }
}

#[test]
fn test_do_block_is_an_operand() {
    assert_eq!(combine_ok("x = do\n  1"), "(<root> (= x (<do> 1)))");
}

#[test]
fn test_macro_definition_enters_key_scope() {
    let source = "#macro twice x #quote\n  #unquote x + #unquote x\ntwice 3";
    let (tree, root, errors) = combine_source(source);
    assert!(errors.is_empty(), "{errors:?}");
    let invocation = tree.children(root)[1];
    assert!(tree.symbol(invocation).is_macro());
    assert_eq!(tree.sexpr(invocation), "(twice 3)");
}

// --- 错误路径 ---

#[test]
fn test_unknown_operator() {
    assert_eq!(combine_errors("a +? b"), vec!["E0106"]);
}

#[test]
fn test_operator_run_is_split_greedily() {
    assert_eq!(combine_ok("a=-b"), "(<root> (= a (neg b)))");
}

#[test]
fn test_unattached_else() {
    assert_eq!(combine_errors("else\n  x"), vec!["E0108"]);
}

#[test]
fn test_try_without_handler_is_malformed() {
    assert_eq!(combine_errors("try\n  a"), vec!["E0109"]);
}

#[test]
fn test_object_entry_without_key() {
    assert_eq!(combine_errors("{1}"), vec!["E0110"]);
}

#[test]
fn test_leftover_items_are_unexpected() {
    assert_eq!(combine_errors("a = 1 )"), vec!["E0101", "E0102"]);
    assert_eq!(combine_errors("x = 1 else"), vec!["E0107"]);
}
