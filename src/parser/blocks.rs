// src/parser/blocks.rs
//
// 每一种块对换行、逗号和闭括号的反应。

use super::BlockParser;
use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, Label};
use crate::symbols::BlockKind;
use crate::utils::Loc;

impl BlockParser<'_> {
    pub(super) fn handle_new_line(&mut self, column: u32, loc: Loc) {
        let mut dedented = false;
        loop {
            let top = self.top();
            match top.kind {
                // 括号里的换行只是续行
                BlockKind::Paren | BlockKind::Square | BlockKind::Curly => return,
                BlockKind::Comma => {
                    if self.parent_kind() == Some(BlockKind::Line) {
                        self.pop();
                        continue;
                    }
                    return;
                }
                BlockKind::Root | BlockKind::Block | BlockKind::Do => {
                    if top.level.is_none() {
                        let index = self.stack.len() - 1;
                        self.stack[index].level = Some(column);
                    }
                    self.open(BlockKind::Line, None, loc);
                    return;
                }
                BlockKind::Line => {
                    let parent_index = self.stack.len() - 2;
                    let parent = self.stack[parent_index];
                    let Some(level) = parent.level else {
                        // `do` 之后的第一行决定它的缩进；没有缩进进去的话它就是空的
                        if parent.kind == BlockKind::Do && column <= self.enclosing_level(parent_index) {
                            self.pop();
                            self.pop();
                            continue;
                        }
                        self.stack[parent_index].level = Some(column);
                        if !self.tree.children(top.id).is_empty() {
                            self.pop();
                            self.open(BlockKind::Line, None, loc);
                        }
                        return;
                    };

                    if column > level && !dedented {
                        self.open(BlockKind::Block, Some(column), loc);
                        self.open(BlockKind::Line, None, loc);
                        return;
                    }
                    if column >= level {
                        if column != level {
                            self.report_inconsistent_dedent(loc);
                        }
                        self.pop();
                        self.open(BlockKind::Line, None, loc);
                        return;
                    }
                    if parent.kind == BlockKind::Root {
                        self.report_inconsistent_dedent(loc);
                        self.pop();
                        self.open(BlockKind::Line, None, loc);
                        return;
                    }
                    self.pop();
                    self.pop();
                    dedented = true;
                }
            }
        }
    }

    pub(super) fn handle_comma(&mut self, loc: Loc) {
        let top = self.top();
        match top.kind {
            BlockKind::Comma => {
                self.pop();
                self.open(BlockKind::Comma, None, loc);
            }
            BlockKind::Line => {
                // 行级逗号：把已有内容收进第一个分组
                let has_groups = self
                    .tree
                    .children(top.id)
                    .iter()
                    .any(|&c| self.tree.symbol(c).as_block() == Some(BlockKind::Comma));
                if !has_groups {
                    let first = self.tree.alloc(self.env.block(BlockKind::Comma), None, loc);
                    for child in self.tree.take_children(top.id) {
                        self.tree.append_child(first, child);
                    }
                    self.tree.append_child(top.id, first);
                }
                self.open(BlockKind::Comma, None, loc);
            }
            BlockKind::Paren | BlockKind::Square | BlockKind::Curly => {
                self.open(BlockKind::Comma, None, loc);
            }
            BlockKind::Root | BlockKind::Block | BlockKind::Do => {}
        }
    }

    pub(super) fn handle_close(&mut self, c: char, loc: Loc) {
        loop {
            let top = self.top();
            match top.kind {
                BlockKind::Comma => {
                    self.pop();
                }
                BlockKind::Paren | BlockKind::Square | BlockKind::Curly => {
                    if let Some(expected) = top.kind.close_char().filter(|&e| e != c) {
                        let opened = self.tree.loc(top.id);
                        self.diagnostics.report(
                            Diagnostic::error(
                                &E0103_MISMATCHED_CLOSE,
                                Label::new(loc, format!("expected `{expected}`, found `{c}`")),
                            )
                            .with_secondary_label(Label::new(opened, "unclosed bracket opened here")),
                        );
                    }
                    self.pop();
                    return;
                }
                BlockKind::Line | BlockKind::Block | BlockKind::Do | BlockKind::Root => {
                    if self.has_open_bracket() {
                        // 括号里的 `do` 块和缩进块随括号一起结束
                        self.pop();
                        continue;
                    }
                    self.diagnostics.report(Diagnostic::error(
                        &E0101_MISPLACED_CLOSE,
                        Label::new(loc, format!("`{c}` does not close anything")),
                    ));
                    self.diagnostics.report(Diagnostic::error(
                        &E0102_CLOSING_ROOT_BLOCK,
                        Label::new(loc, "the root block is closed only by the end of the input"),
                    ));
                    return;
                }
            }
        }
    }

    /// 输入结束：关闭除根块以外的所有块。
    pub(super) fn finish(&mut self) {
        while let Some(block) = self.pop() {
            if block.kind.is_bracket() {
                let loc = self.tree.loc(block.id);
                self.diagnostics.report(Diagnostic::error(
                    &E0105_UNCLOSED_BLOCK,
                    Label::new(loc, "this bracket is never closed"),
                ));
            }
        }
    }

    fn report_inconsistent_dedent(&mut self, loc: Loc) {
        self.diagnostics.report(Diagnostic::error(
            &E0104_INCONSISTENT_DEDENT,
            Label::new(loc, "this line does not line up with any enclosing block"),
        ));
    }
}
