use super::*;
use crate::symbols::RootEnv;
use crate::utils::{SourceId, make_loc};
use pretty_assertions::assert_eq;

fn loc(column: u32) -> Loc {
    make_loc(SourceId::default(), 1, column).unwrap()
}

fn tag(tree: &mut ExprTree, env: &RootEnv, name: &str) -> ExprId {
    tree.alloc(env.tag(TagKind::USE), Some(Value::Name(name.to_string())), loc(0))
}

#[test]
fn test_append_moves_child_between_parents() {
    let env = RootEnv::standard();
    let mut tree = ExprTree::new();
    let a = tree.alloc(env.builtin(Builtin::Tuple), None, loc(0));
    let b = tree.alloc(env.builtin(Builtin::Tuple), None, loc(0));
    let x = tag(&mut tree, &env, "x");

    tree.append_child(a, x);
    tree.append_child(b, x);
    assert!(tree.children(a).is_empty());
    assert_eq!(tree.children(b), &[x]);
    assert_eq!(tree.parent(x), Some(b));
    assert!(tree.is_consistent(b));
}

#[test]
fn test_replace_keeps_position() {
    let env = RootEnv::standard();
    let mut tree = ExprTree::new();
    let add = tree.alloc(env.builtin(Builtin::Add), None, loc(2));
    let x = tag(&mut tree, &env, "x");
    let y = tag(&mut tree, &env, "y");
    let z = tag(&mut tree, &env, "z");
    tree.append_child(add, x);
    tree.append_child(add, y);

    tree.replace(x, z);
    assert_eq!(tree.children(add), &[z, y]);
    assert_eq!(tree.parent(x), None);
    assert_eq!(tree.sexpr(add), "(+ z y)");
}

#[test]
fn test_transform_into_keeps_identity() {
    let env = RootEnv::standard();
    let mut tree = ExprTree::new();
    let call = tree.alloc(env.builtin(Builtin::Call), None, loc(0));
    let target = tag(&mut tree, &env, "m");
    tree.append_child(call, target);

    let neg = tree.alloc(env.builtin(Builtin::Neg), None, loc(4));
    let one = tree.alloc(env.value(), Some(Value::Number(1.0)), loc(5));
    tree.append_child(neg, one);

    tree.transform_into(target, neg);
    assert_eq!(tree.children(call), &[target]);
    assert_eq!(tree.sexpr(call), "(<call> (neg 1))");
    assert_eq!(tree.parent(one), Some(target));
    assert!(tree.children(neg).is_empty());
    assert!(tree.is_consistent(call));
}

#[test]
fn test_deep_clone_is_detached_copy() {
    let env = RootEnv::standard();
    let mut tree = ExprTree::new();
    let add = tree.alloc(env.builtin(Builtin::Add), None, loc(0));
    let x = tag(&mut tree, &env, "x");
    let s = tree.alloc(env.value(), Some(Value::Str("hi".into())), loc(0));
    tree.append_child(add, x);
    tree.append_child(add, s);

    let copy = tree.deep_clone(add);
    assert_ne!(copy, add);
    assert_eq!(tree.parent(copy), None);
    assert_eq!(tree.sexpr(copy), r#"(+ x "hi")"#);
    assert!(tree.children(copy).iter().all(|c| !tree.children(add).contains(c)));
}

#[test]
fn test_descendants_are_preorder() {
    let env = RootEnv::standard();
    let mut tree = ExprTree::new();
    let mul = tree.alloc(env.builtin(Builtin::Mul), None, loc(0));
    let add = tree.alloc(env.builtin(Builtin::Add), None, loc(0));
    let a = tag(&mut tree, &env, "a");
    let b = tag(&mut tree, &env, "b");
    let c = tag(&mut tree, &env, "c");
    tree.append_child(add, a);
    tree.append_child(add, b);
    tree.append_child(mul, add);
    tree.append_child(mul, c);
    assert_eq!(tree.descendants(mul), vec![mul, add, a, b, c]);

    tree.set_origin_recursive(add, loc(9));
    assert_eq!(tree.node(b).origin, Some(loc(9)));
    assert_eq!(tree.node(c).origin, None);
    assert_eq!(tree.node(b).expansion_site(), loc(9));
}
