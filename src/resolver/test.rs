use super::*;
use crate::utils::SourceId;
use crate::{combiner, lexer, macros, parser};
use pretty_assertions::assert_eq;

/// 辅助函数：运行到变量解析结束，返回树、根节点和所有诊断。
fn resolve_with(env: &RootEnv, source: &str) -> (ExprTree, ExprId, DiagnosticBag) {
    let mut tree = ExprTree::new();
    let mut diagnostics = DiagnosticBag::new();
    let lines = lexer::tokenize(source, SourceId::default(), None, &mut diagnostics);
    let root = parser::parse(lines, SourceId::default(), env, &mut tree, &mut diagnostics);
    let mut keys = ScopeArena::new(env.root_keys(true));
    combiner::combine(root, env, &mut tree, &mut keys, &mut diagnostics);
    macros::expand(root, env, &mut tree, &mut diagnostics, Default::default());
    assert!(diagnostics.is_empty(), "errors before resolution: {:?}", diagnostics.codes());
    resolve(root, env, &mut tree, &mut diagnostics);
    (tree, root, diagnostics)
}

fn resolve_source(source: &str) -> (ExprTree, ExprId, DiagnosticBag) {
    resolve_with(&RootEnv::standard(), source)
}

fn resolve_errors(source: &str) -> Vec<String> {
    let (_, _, diagnostics) = resolve_source(source);
    diagnostics.codes().into_iter().map(String::from).collect()
}

fn assert_resolves(source: &str) {
    let errors = resolve_errors(source);
    assert!(errors.is_empty(), "unexpected errors {errors:?} for source: {source}");
}

fn hoisted_names(tree: &ExprTree, host: ExprId) -> Vec<String> {
    tree.node(host)
        .decls
        .as_ref()
        .map(|decls| decls.keys().cloned().collect())
        .unwrap_or_default()
}

/// 找到第一个名字为 `name` 的标签节点（先序）。
fn find_tags(tree: &ExprTree, root: ExprId, name: &str) -> Vec<ExprId> {
    tree.descendants(root)
        .into_iter()
        .filter(|&id| tree.tag_kind(id).is_some() && tree.name(id) == Some(name))
        .collect()
}

// --- 成功路径 ---

#[test]
fn test_use_binds_to_its_declaration() {
    let (tree, root, diagnostics) = resolve_source("var x = 1\nx = x + 1");
    assert!(diagnostics.is_empty());

    let tags = find_tags(&tree, root, "x");
    assert_eq!(tags.len(), 3);
    let declaration = tree.node(tags[0]).binding.clone().unwrap();
    for &tag in &tags[1..] {
        let binding = tree.node(tag).binding.clone().unwrap();
        assert!(Rc::ptr_eq(&declaration, &binding));
    }
    assert!(tree.node(root).resolved);
}

#[test]
fn test_declarations_are_hoisted_in_order() {
    let (tree, root, _) = resolve_source("var b = 1\nvar a = 2\nconst c = 3");
    assert_eq!(hoisted_names(&tree, root), vec!["b", "a", "c"]);
}

#[test]
fn test_inner_blocks_host_their_own_declarations() {
    let (tree, root, diagnostics) = resolve_source("var x = 1\nif x\n  var x = 2\n  x");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics.codes());
    assert_eq!(hoisted_names(&tree, root), vec!["x"]);

    let block = tree
        .descendants(root)
        .into_iter()
        .find(|&id| id != root && tree.is_block_like(id))
        .unwrap();
    assert_eq!(hoisted_names(&tree, block), vec!["x"]);
}

#[test]
fn test_function_parameters_are_not_hoisted() {
    let source = "var f = fn (a, b)\n  var c = a + b\n  c";
    let (tree, root, diagnostics) = resolve_source(source);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics.codes());
    assert_eq!(hoisted_names(&tree, root), vec!["f"]);

    let function = tree.descendants(root).into_iter().find(|&id| tree.is(id, Builtin::Fn)).unwrap();
    assert!(hoisted_names(&tree, function).is_empty());
    let param = find_tags(&tree, root, "a")[0];
    assert!(!tree.node(param).binding.as_ref().unwrap().hoisted);
}

#[test]
fn test_catch_parameter_is_scoped_to_the_handler() {
    assert_resolves("try\n  throw 1\ncatch e\n  e");
    assert_eq!(resolve_errors("try\n  throw 1\ncatch e\n  e\ne"), vec!["E0200"]);
}

#[test]
fn test_loop_variables_belong_to_the_loop() {
    let source = "loop i = 0\n  if i < 10\n    next i + 1";
    let (tree, root, diagnostics) = resolve_source(source);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics.codes());
    let lp = tree.children(root)[0];
    assert_eq!(hoisted_names(&tree, lp), vec!["i"]);
    assert!(hoisted_names(&tree, root).is_empty());
}

#[test]
fn test_loop_initial_value_sees_the_outer_scope() {
    assert_eq!(resolve_errors("loop i = i\n  end"), vec!["E0200"]);
}

#[test]
fn test_property_names_are_not_resolved() {
    assert_resolves("var a = {b: 1}\na.b = a.c");
}

#[test]
fn test_external_and_global_names() {
    assert_resolves("#external console\nconsole.log(1)");

    let env = RootEnv::standard().with_global("window");
    let (_, _, diagnostics) = resolve_with(&env, "window.x = 1");
    assert!(diagnostics.is_empty());
}

#[test]
fn test_tuple_assignment_targets() {
    assert_resolves("var a = 1\nvar b = 2\n(a, b) = (b, a)");
}

// --- 错误路径 ---

#[test]
fn test_undeclared_identifier_is_reported_once() {
    let (_, _, diagnostics) = resolve_source("y + 1");
    assert_eq!(diagnostics.codes(), vec!["E0200"]);
    assert_eq!(diagnostics.iter().next().unwrap().message(), "Undeclared identifier `y`");
}

#[test]
fn test_redeclaration_references_both_locations() {
    let (_, _, diagnostics) = resolve_source("var x = 1\nvar x = 2");
    assert_eq!(diagnostics.codes(), vec!["E0201"]);

    let diagnostic = diagnostics.iter().next().unwrap();
    let lines: Vec<u32> = diagnostic.labels().iter().map(|l| l.loc.line()).collect();
    assert_eq!(lines, vec![2, 1]);
}

#[test]
fn test_assignment_to_constant() {
    let (_, _, diagnostics) = resolve_source("const k = 1\nk = 2");
    assert_eq!(diagnostics.codes(), vec!["E0202"]);
    assert_eq!(diagnostics.iter().next().unwrap().labels().len(), 2);
}

#[test]
fn test_invalid_assignment_target() {
    assert_eq!(resolve_errors("1 = 2"), vec!["E0203"]);
    assert_eq!(resolve_errors("var f = 1\nf(1) = 2"), vec!["E0203"]);
}

#[test]
fn test_invalid_declaration() {
    assert_eq!(resolve_errors("var (1)"), vec!["E0209"]);
}

#[test]
fn test_pair_outside_object() {
    assert_eq!(resolve_errors("var a = 1\na : 2"), vec!["E0110"]);
}

#[test]
fn test_stray_virtual_identifier() {
    assert_eq!(resolve_errors("`v"), vec!["E0303"]);
}

#[test]
fn test_error_inside_template_points_into_the_template() {
    let (_, _, diagnostics) = resolve_source("#macro m x #quote\n  zzz + #unquote x\n\nm 1");
    assert_eq!(diagnostics.codes(), vec!["E0200"]);
    let diagnostic = diagnostics.iter().next().unwrap();
    // 主位置在模板里，展开位置在调用点
    assert_eq!((diagnostic.line(), diagnostic.column()), (2, 2));
    let origin = diagnostic.origin().expect("expanded node has an origin");
    assert_eq!(origin.line(), 4);
    assert_eq!(diagnostic.expanded_from(), Some(origin));
}

#[test]
fn test_error_outside_macros_has_no_expansion_site() {
    let (_, _, diagnostics) = resolve_source("zzz");
    let diagnostic = diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.origin(), None);
    assert_eq!(diagnostic.expanded_from(), None);
}
