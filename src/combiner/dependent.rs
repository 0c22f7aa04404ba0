// src/combiner/dependent.rs
//
// 从属子句（`else`、`catch`、`finally`）的拼接与形状检查。

use super::Combiner;
use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, Label};
use crate::expr::{ExprId, ExprTree};
use crate::symbols::{BlockKind, Builtin};

/// `node` 现在是否还能吸收一个 `clause` 子句。
/// `catch` 必须在 `finally` 之前，每种子句最多一个。
pub(super) fn accepts(tree: &ExprTree, node: ExprId, clause: Builtin) -> bool {
    let Some(owner) = tree.builtin(node) else { return false };
    let dependents = owner.arity().dependents;
    if !dependents.contains(&clause) {
        return false;
    }
    let present: Vec<Builtin> = tree
        .children(node)
        .iter()
        .filter_map(|&c| tree.builtin(c))
        .filter(|b| dependents.contains(b))
        .collect();
    match clause {
        Builtin::Catch => present.is_empty(),
        _ => !present.contains(&clause),
    }
}

/// 把另起一行的子句挂到上一条语句右侧脊线上最近的、还能接受它的结构上。
/// 不会进入缩进块和 `do` 块内部。
pub(super) fn attach(tree: &mut ExprTree, statement: ExprId, clause: ExprId) -> bool {
    let Some(kind) = tree.builtin(clause) else { return false };
    let mut current = statement;
    loop {
        if accepts(tree, current, kind) {
            tree.append_child(current, clause);
            return true;
        }
        match tree.children(current).last() {
            Some(&last) if !tree.is_block_like(last) => current = last,
            _ => return false,
        }
    }
}

impl Combiner<'_> {
    pub(super) fn report_unattached(&mut self, clause: ExprId) {
        let name = self.tree.symbol(clause).name().to_string();
        let loc = self.tree.loc(clause);
        self.diagnostics.report(
            Diagnostic::error(&E0108_UNATTACHED_CLAUSE, Label::new(loc, "nothing before this accepts it"))
                .with_dynamic_message(format!("`{name}` has nothing to attach to")),
        );
    }

    /// 检查一条语句里从属子句的形状。缩进块内部在组合时已经检查过。
    pub(super) fn validate_clauses(&mut self, statement: ExprId) {
        let mut stack = vec![statement];
        while let Some(node) = stack.pop() {
            stack.extend(self.tree.children(node).iter().filter(|&&c| !self.tree.is_block_like(c)));
            let Some(builtin) = self.tree.builtin(node) else { continue };
            let parent = self.tree.parent(node).and_then(|p| self.tree.builtin(p));
            match builtin {
                Builtin::Else => {
                    if parent != Some(Builtin::If) {
                        self.report_unattached(node);
                        continue;
                    }
                    let children = self.tree.children(node);
                    let well_formed = children.len() == 1
                        && (self.tree.is(children[0], Builtin::If)
                            || self.tree.symbol(children[0]).as_block() == Some(BlockKind::Block));
                    if !well_formed {
                        self.report_malformed(node, "`else` must be followed by `if` or an indented block");
                    }
                }
                Builtin::Catch => {
                    if parent != Some(Builtin::Try) {
                        self.report_unattached(node);
                        continue;
                    }
                    let named = self
                        .tree
                        .child(node, 0)
                        .and_then(|c| self.tree.tag_kind(c))
                        .is_some();
                    if !named || self.tree.children(node).len() != 2 {
                        self.report_malformed(node, "`catch` needs a name and a body");
                    }
                }
                Builtin::Finally => {
                    if parent != Some(Builtin::Try) {
                        self.report_unattached(node);
                    }
                }
                Builtin::Try => {
                    let has_clause = self
                        .tree
                        .children(node)
                        .iter()
                        .any(|&c| self.tree.is(c, Builtin::Catch) || self.tree.is(c, Builtin::Finally));
                    if !has_clause {
                        self.report_malformed(node, "`try` needs a `catch` or a `finally`");
                    }
                }
                _ => {}
            }
        }
    }

    fn report_malformed(&mut self, node: ExprId, message: &str) {
        let loc = self.tree.loc(node);
        self.diagnostics
            .report(Diagnostic::error(&E0109_MALFORMED_CLAUSE, Label::new(loc, message)));
    }
}
