use super::*;
use pretty_assertions::assert_eq;
use std::collections::HashMap;

#[test]
fn test_tag_conversions() {
    let tag = TagKind::USE;
    assert!(!tag.is_declaration());
    let decl = tag.to_tag_declaration();
    assert!(decl.is_declaration());
    assert!(!decl.is_constant());
    let constant = decl.to_constant_tag();
    assert!(constant.is_constant() && constant.is_declaration());
    let virt = constant.to_virtual_tag();
    assert!(virt.is_virtual());
    assert_eq!(virt.to_concrete(), constant);
    assert_eq!(virt.to_external_tag(), TagKind::External);
    // 外部标签不再受其他转换影响
    assert_eq!(TagKind::External.to_tag_declaration(), TagKind::External);
}

#[test]
fn test_precedence_ordering() {
    let p = |b: Builtin| b.data().precedence;
    assert!(p(Builtin::Assign) < p(Builtin::Or));
    assert!(p(Builtin::Or) < p(Builtin::And));
    assert!(p(Builtin::And) < p(Builtin::Eq));
    assert!(p(Builtin::Eq) < p(Builtin::Lt));
    assert!(p(Builtin::Lt) < p(Builtin::Add));
    assert!(p(Builtin::Add) < p(Builtin::Mul));
    assert!(p(Builtin::Mul) < p(Builtin::Neg));
    assert!(p(Builtin::Neg) < p(Builtin::Call));
    assert!(p(Builtin::Call) < p(Builtin::Member));
    assert!(Builtin::Assign.arity().right_assoc);
}

#[test]
fn test_arity_bounds() {
    let if_arity = Builtin::If.arity();
    assert_eq!(if_arity.min_operands(), 2);
    assert_eq!(if_arity.max_operands(), 2);
    assert_eq!(if_arity.max_with_dependents(), 3);
    assert_eq!(Builtin::Add.arity().min_operands(), 2);
    assert_eq!(Builtin::Loop.arity().min_operands(), 1);
    assert_eq!(Builtin::Loop.arity().max_operands(), 2);
    assert_eq!(Builtin::DefMacro.arity().leading_atoms, 2);
    assert!(Builtin::Tuple.arity().sequence);
}

#[test]
fn test_root_env_prelude_switch() {
    let env = RootEnv::standard();
    let with = env.root_keys(true);
    let without = env.root_keys(false);
    assert!(with.contains_key("#macro"));
    assert!(with.contains_key("@"));
    assert!(!without.contains_key("#macro"));
    assert!(without.contains_key("if"));
    assert!(Rc::ptr_eq(&with["or"], &with["||"]));
    assert!(Rc::ptr_eq(&env.builtin(Builtin::Add), &with["+"]));
}

#[test]
fn test_singletons_are_shared() {
    let env = RootEnv::standard();
    assert!(Rc::ptr_eq(&env.tag(TagKind::USE), &env.tag(TagKind::USE)));
    assert!(Rc::ptr_eq(&env.block(BlockKind::Do), &env.block(BlockKind::Do)));
    assert_eq!(env.block(BlockKind::Do).as_block(), Some(BlockKind::Do));
}

#[test]
fn test_scope_layers_shadow_and_reject_duplicates() {
    let mut base = HashMap::new();
    base.insert("print".to_string(), 0);
    let mut arena = ScopeArena::new(Rc::new(base));
    let root = arena.root();
    let inner = arena.extend(root);

    assert_eq!(arena.lookup(inner, "print"), Some(&0));
    assert!(arena.is_from_base(inner, "print"));

    arena.define(root, "x", 1).unwrap();
    arena.define(inner, "x", 2).unwrap();
    assert_eq!(arena.lookup(inner, "x"), Some(&2));
    assert_eq!(arena.lookup(root, "x"), Some(&1));
    assert_eq!(arena.define(inner, "x", 3), Err(2));

    arena.insert(inner, "print", 9);
    assert_eq!(arena.lookup(inner, "print"), Some(&9));
    assert!(!arena.is_from_base(inner, "print"));
    assert_eq!(arena.lookup_local(inner, "missing"), None);
    assert_eq!(arena.parent(inner), Some(root));
}
