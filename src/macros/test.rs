use super::*;
use crate::combiner;
use crate::lexer;
use crate::parser;
use crate::symbols::{Arity, ScopeArena};
use crate::utils::SourceId;
use pretty_assertions::assert_eq;

/// 辅助函数：从源码一直运行到宏展开结束。
fn expand_with(env: &RootEnv, source: &str, trace: bool) -> (ExprTree, ExprId, DiagnosticBag) {
    let mut tree = ExprTree::new();
    let mut diagnostics = DiagnosticBag::new();
    let lines = lexer::tokenize(source, SourceId::default(), None, &mut diagnostics);
    let root = parser::parse(lines, SourceId::default(), env, &mut tree, &mut diagnostics);
    let mut keys = ScopeArena::new(env.root_keys(true));
    combiner::combine(root, env, &mut tree, &mut keys, &mut diagnostics);
    let options = ExpandOptions {
        trace_failures: trace,
        source_text: Some(source),
    };
    expand(root, env, &mut tree, &mut diagnostics, options);
    assert!(tree.is_consistent(root));
    (tree, root, diagnostics)
}

fn expand_ok(source: &str) -> String {
    let (tree, root, diagnostics) = expand_with(&RootEnv::standard(), source, false);
    assert!(diagnostics.is_empty(), "unexpected errors {:?}", diagnostics.codes());
    tree.sexpr(root)
}

fn expand_errors(env: &RootEnv, source: &str) -> Vec<String> {
    let (_, _, diagnostics) = expand_with(env, source, false);
    diagnostics.codes().into_iter().map(String::from).collect()
}

const TWICE: &str = "#macro twice x #quote\n  #unquote x + #unquote x\n";

/// 每次都把调用节点原样复制一份，永远展开不完。
#[derive(Debug)]
struct Forever;

impl MacroExpander for Forever {
    fn expand(&self, cx: &mut MacroContext<'_>, node: ExprId) -> Result<Expansion, MacroError> {
        Ok(Expansion::Replace(cx.tree.deep_clone(node)))
    }
}

#[derive(Debug)]
struct Refuses;

impl MacroExpander for Refuses {
    fn expand(&self, _cx: &mut MacroContext<'_>, _node: ExprId) -> Result<Expansion, MacroError> {
        Err(MacroError::Message("refusing to expand".to_string()))
    }

    fn describe(&self, _tree: &ExprTree) -> Option<String> {
        Some("the refusing macro".to_string())
    }
}

#[derive(Debug)]
struct Crashes;

impl MacroExpander for Crashes {
    fn expand(&self, _cx: &mut MacroContext<'_>, _node: ExprId) -> Result<Expansion, MacroError> {
        panic!("expander bug");
    }
}

// --- 模板宏 ---

#[test]
fn test_template_substitutes_arguments() {
    let source = format!("{TWICE}twice 3");
    assert_eq!(expand_ok(&source), "(<root> (+ 3 3))");
}

#[test]
fn test_template_with_several_parameters() {
    let source = "#macro swap (a, b) #quote\n  (#unquote b, #unquote a)\nswap(1, 2)";
    assert_eq!(expand_ok(source), "(<root> (<tuple> 2 1))");
}

#[test]
fn test_template_that_is_a_single_hole() {
    let source = "#macro id x #quote\n  #unquote x\nid 5";
    assert_eq!(expand_ok(source), "(<root> 5)");
}

#[test]
fn test_nested_invocations_expand_inside_out() {
    let source = format!("{TWICE}twice (twice 1)");
    assert_eq!(expand_ok(&source), "(<root> (+ (+ 1 1) (+ 1 1)))");
}

#[test]
fn test_expanded_nodes_remember_the_invocation() {
    let source = format!("{TWICE}twice 3");
    let (tree, root, _) = expand_with(&RootEnv::standard(), &source, false);
    let sum = tree.children(root)[0];
    let origin = tree.node(sum).origin.expect("expanded node has an origin");
    assert_eq!(origin.line(), 3);
    assert_eq!(tree.node(sum).expansion_site(), origin);
    assert_eq!(tree.node(sum).loc.line(), 2);
}

#[test]
fn test_definition_is_removed_after_expansion() {
    let source = format!("{TWICE}x = 1");
    assert_eq!(expand_ok(&source), "(<root> (= x 1))");
}

#[test]
fn test_wrong_argument_count() {
    let source = "#macro swap (a, b) #quote\n  (#unquote b, #unquote a)\nswap(1, 2, 3)";
    assert_eq!(expand_errors(&RootEnv::standard(), source), vec!["E0306"]);
}

#[test]
fn test_unquote_must_name_a_parameter() {
    let source = "#macro bad x #quote\n  #unquote y\nbad 1";
    assert_eq!(expand_errors(&RootEnv::standard(), source), vec!["E0302"]);
}

// --- 卫生 ---

#[test]
fn test_virtual_names_are_renamed_per_expansion() {
    let source = "#macro keep x #quote\n  var `t = #unquote x\nvar t = 1\nkeep 2\nkeep 3";
    assert_eq!(
        expand_ok(source),
        "(<root> (= (var t) 1) (= (var t$1) 2) (= (var t$2) 3))"
    );
}

#[test]
fn test_virtual_use_without_declaration() {
    let source = "#macro bad x #quote\n  `u + #unquote x\nbad 1";
    assert_eq!(expand_errors(&RootEnv::standard(), source), vec!["E0303"]);
}

#[test]
fn test_name_generator_is_monotonic() {
    let mut names = NameGen::new();
    assert_eq!(names.fresh("a"), "a$1");
    assert_eq!(names.fresh("a"), "a$2");
    assert_eq!(names.fresh("b"), "b$3");
}

// --- 前奏宏 ---

#[test]
fn test_at_is_member_of_this() {
    assert_eq!(expand_ok("@name"), "(<root> (. this name))");
}

#[test]
fn test_misplaced_quote_and_unquote() {
    let env = RootEnv::standard();
    assert_eq!(expand_errors(&env, "#quote x"), vec!["E0304"]);
    assert_eq!(expand_errors(&env, "#unquote x"), vec!["E0304"]);
}

// --- 原生宏 ---

#[test]
fn test_call_macro_spreads_tuples() {
    let env = RootEnv::standard().with_macro("print", Arity::prefix(1, 1), Rc::new(CallMacro::new("print")));
    let (tree, root, diagnostics) = expand_with(&env, "print 42\nprint(1, 2)", false);
    assert!(diagnostics.is_empty());
    assert_eq!(tree.sexpr(root), "(<root> (<call> print 42) (<call> print 1 2))");

    let call = tree.children(root)[0];
    let callee = tree.children(call)[0];
    assert_eq!(tree.tag_kind(callee), Some(TagKind::External));
}

#[test]
fn test_runaway_expansion_hits_the_limit() {
    let env = RootEnv::standard().with_macro("forever", Arity::prefix(0, 0), Rc::new(Forever));
    assert_eq!(expand_errors(&env, "forever"), vec!["E0305"]);
}

#[test]
fn test_expander_errors_are_reported() {
    let env = RootEnv::standard().with_macro("refuse", Arity::prefix(1, 1), Rc::new(Refuses));
    assert_eq!(expand_errors(&env, "refuse 1"), vec!["E0300"]);

    let (_, _, diagnostics) = expand_with(&env, "refuse 1", true);
    let diagnostic = diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.message(), "refusing to expand");
    assert_eq!(
        diagnostic.notes(),
        ["while expanding the refusing macro", "invoked at line 1: refuse 1"]
    );
}

#[test]
fn test_expander_panics_are_contained() {
    let env = RootEnv::standard().with_macro("crash", Arity::prefix(1, 1), Rc::new(Crashes));
    let (tree, root, diagnostics) = expand_with(&env, "crash 1\nx = 2", false);
    assert_eq!(diagnostics.codes(), vec!["E0301"]);
    // 其余语句照常展开
    assert_eq!(tree.children(root).len(), 2);
}
