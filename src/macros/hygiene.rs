// src/macros/hygiene.rs

use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, Label};
use crate::expr::{ExprId, ExprTree, Value};
use crate::symbols::RootEnv;
use std::collections::HashMap;

/// 生成不会和用户名字冲突的新名字：`name$N`。用户标识符里不能出现 `$`。
#[derive(Debug, Default)]
pub struct NameGen {
    counter: u32,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, base: &str) -> String {
        self.counter += 1;
        format!("{base}${}", self.counter)
    }
}

/// 一次展开里虚拟名字到新名字的映射。
#[derive(Debug, Default)]
struct RenameMap {
    names: HashMap<String, String>,
}

impl RenameMap {
    fn declare(&mut self, name: &str, names: &mut NameGen) -> String {
        self.names
            .entry(name.to_string())
            .or_insert_with(|| names.fresh(name))
            .clone()
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.names.get(name).map(String::as_str)
    }
}

/// 把刚展开出来的子树里的虚拟标签换成新名字，并变回具体标签。
///
/// 按先序处理，所以声明要出现在使用之前。
pub fn rename_virtuals(tree: &mut ExprTree, env: &RootEnv, root: ExprId, names: &mut NameGen) -> Vec<Diagnostic> {
    let mut map = RenameMap::default();
    let mut errors = Vec::new();

    for id in tree.descendants(root) {
        let Some(kind) = tree.tag_kind(id).filter(|k| k.is_virtual()) else { continue };
        let Some(name) = tree.name(id).map(str::to_string) else { continue };

        let fresh = if kind.is_declaration() {
            map.declare(&name, names)
        } else {
            match map.lookup(&name) {
                Some(fresh) => fresh.to_string(),
                None => {
                    let node = tree.node(id);
                    errors.push(
                        Diagnostic::error(
                            &E0303_UNDECLARED_VIRTUAL_IDENTIFIER,
                            Label::new(node.loc, "used before the template declares it"),
                        )
                        .with_dynamic_message(format!("Undeclared virtual identifier `{name}`"))
                        .with_origin(node.origin),
                    );
                    continue;
                }
            }
        };

        let node = tree.node_mut(id);
        node.value = Some(Value::Name(fresh));
        node.symbol = env.tag(kind.to_concrete());
    }
    errors
}
