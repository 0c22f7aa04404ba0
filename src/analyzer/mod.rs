//! src/analyzer/mod.rs
//!
//! 操作数个数与结果个数检查。
//!
//! 每个节点按照"期望几个值"来检查：`None` 表示处在语句位置、结果被丢弃，
//! `Some(n)` 表示外层要恰好 n 个值。检查返回节点实际产生的值的个数，
//! 并记录在节点的 `result_count` 上，代码生成据此决定怎样降级。
//! 检查不修改树的结构，对同一棵树重复运行得到相同的结果。

mod control;
#[cfg(test)]
mod test;

use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, DiagnosticBag, Label};
use crate::expr::{ExprId, ExprTree};
use crate::symbols::{BlockKind, Builtin, SymbolFlags, SymbolKind};

/// 跳转语句的目标，沿着树向下传递。
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Context {
    /// 最近的 `do`/`loop` 期望的结果个数；外层 `None` 表示不在任何 `do`/`loop` 里
    end_arity: Option<Option<usize>>,
    /// 最近的 `loop` 的循环变量个数
    loop_arity: Option<usize>,
    in_function: bool,
}

pub struct Checker<'a> {
    tree: &'a mut ExprTree,
    diagnostics: &'a mut DiagnosticBag,
}

impl<'a> Checker<'a> {
    pub fn new(tree: &'a mut ExprTree, diagnostics: &'a mut DiagnosticBag) -> Self {
        Self { tree, diagnostics }
    }

    pub fn check_root(&mut self, root: ExprId) -> usize {
        self.check(root, None, Context::default())
    }

    fn check(&mut self, id: ExprId, expected: Option<usize>, cx: Context) -> usize {
        let count = self.check_node(id, expected, cx);
        self.tree.node_mut(id).result_count = Some(count);
        count
    }

    fn check_node(&mut self, id: ExprId, expected: Option<usize>, cx: Context) -> usize {
        let symbol = self.tree.symbol(id).clone();
        match symbol.kind() {
            SymbolKind::Block(BlockKind::Root) => {
                for statement in self.tree.children(id).to_vec() {
                    self.check(statement, None, cx);
                }
                0
            }
            SymbolKind::Block(BlockKind::Do) => self.check_do(id, expected, cx),
            SymbolKind::Block(_) => self.check_sequence(id, expected, cx),
            SymbolKind::Builtin(builtin) => {
                if !self.operand_count_ok(id, *builtin) {
                    return expected.unwrap_or(0);
                }
                self.check_builtin(id, *builtin, expected, cx)
            }
            SymbolKind::Tag(_) | SymbolKind::Value | SymbolKind::Token(_) | SymbolKind::Nothing => {
                self.require(id, expected, 1)
            }
            SymbolKind::Macro(_) => expected.unwrap_or(0),
        }
    }

    /// 语句序列：前面的行丢弃结果，最后一行提供整个块的值。
    fn check_sequence(&mut self, id: ExprId, expected: Option<usize>, cx: Context) -> usize {
        let statements = self.tree.children(id).to_vec();
        let Some((&last, rest)) = statements.split_last() else {
            return self.require(id, expected, 0);
        };
        for &statement in rest {
            self.check(statement, None, cx);
        }
        let count = self.check(last, expected, cx);
        expected.unwrap_or(count)
    }

    fn check_builtin(&mut self, id: ExprId, builtin: Builtin, expected: Option<usize>, cx: Context) -> usize {
        let children = self.tree.children(id).to_vec();
        match builtin {
            Builtin::Assign => {
                let [target, value] = children[..] else { return expected.unwrap_or(0) };
                let width = self.target_width(target);
                self.check_targets(target, cx);
                self.check(value, Some(width), cx);
                self.require(id, expected, width)
            }
            Builtin::Tuple => {
                for &element in &children {
                    self.check(element, Some(1), cx);
                }
                self.require(id, expected, children.len())
            }
            Builtin::Member => {
                if let Some(&object) = children.first() {
                    self.check(object, Some(1), cx);
                }
                self.require(id, expected, 1)
            }
            Builtin::Object => {
                for entry in children {
                    match self.tree.child(entry, 1) {
                        Some(value) if self.tree.is(entry, Builtin::Pair) => {
                            self.check(value, Some(1), cx);
                        }
                        _ => {
                            self.check(entry, Some(1), cx);
                        }
                    }
                }
                self.require(id, expected, 1)
            }
            Builtin::Var | Builtin::Const => {
                let width = children.first().map_or(1, |&target| self.target_width(target));
                self.require(id, expected, width)
            }
            Builtin::External => self.require(id, expected, 0),
            Builtin::Fn => {
                if let Some(&body) = children.get(1) {
                    let inner = Context {
                        in_function: true,
                        ..Context::default()
                    };
                    self.check(body, None, inner);
                }
                self.require(id, expected, 1)
            }
            Builtin::If => self.check_if(id, &children, expected, cx),
            Builtin::While => {
                if let [condition, body] = children[..] {
                    self.check(condition, Some(1), cx);
                    self.check(body, None, cx);
                }
                self.require(id, expected, 0)
            }
            Builtin::Loop => self.check_loop(&children, expected, cx),
            Builtin::Try => self.check_try(&children, expected, cx),
            Builtin::Else | Builtin::Finally => match children.first() {
                Some(&body) => self.check(body, expected, cx),
                None => expected.unwrap_or(0),
            },
            Builtin::Catch => match children.get(1) {
                Some(&body) => self.check(body, expected, cx),
                None => expected.unwrap_or(0),
            },
            Builtin::Give | Builtin::Next | Builtin::End | Builtin::Return | Builtin::Throw => {
                self.check_jump(id, builtin, &children, cx);
                expected.unwrap_or(0)
            }
            // 运算符、调用、下标、数组、`new`：每个操作数一个值，产生一个值
            _ => {
                for child in children {
                    self.check(child, Some(1), cx);
                }
                self.require(id, expected, 1)
            }
        }
    }

    /// 赋值目标的宽度：元组按元素个数，其它都是一个值。
    fn target_width(&self, target: ExprId) -> usize {
        let inner = match self.tree.builtin(target) {
            Some(Builtin::Var | Builtin::Const) => self.tree.child(target, 0).unwrap_or(target),
            _ => target,
        };
        if self.tree.is(inner, Builtin::Tuple) {
            self.tree.children(inner).len()
        } else {
            1
        }
    }

    fn check_targets(&mut self, target: ExprId, cx: Context) {
        match self.tree.builtin(target) {
            Some(Builtin::Tuple) => {
                let width = self.tree.children(target).len();
                for element in self.tree.children(target).to_vec() {
                    self.check_targets(element, cx);
                }
                self.tree.node_mut(target).result_count = Some(width);
            }
            Some(Builtin::Member | Builtin::Element) => {
                self.check(target, Some(1), cx);
            }
            _ => {
                let width = self.target_width(target);
                self.tree.node_mut(target).result_count = Some(width);
            }
        }
    }

    /// 操作数个数是否在符号允许的范围内。从属子句不计入。
    fn operand_count_ok(&mut self, id: ExprId, builtin: Builtin) -> bool {
        let arity = builtin.arity();
        if arity.sequence {
            return true;
        }
        let operands = self
            .tree
            .children(id)
            .iter()
            .filter(|&&c| !self.tree.symbol(c).flags().contains(SymbolFlags::DEPENDENT_CLAUSE))
            .count();
        if (arity.min_operands()..=arity.max_operands()).contains(&operands) {
            return true;
        }

        let wanted = if arity.min_operands() == arity.max_operands() {
            format!("{}", arity.min_operands())
        } else {
            format!("{} to {}", arity.min_operands(), arity.max_operands())
        };
        let loc = self.tree.node(id).loc;
        self.diagnostics.report(
            Diagnostic::error(&E0208_OPERAND_COUNT, Label::new(loc, format!("expects {wanted} operand(s)")))
                .with_dynamic_message(format!("`{}` takes {wanted} operand(s) but got {operands}", builtin.name()))
                .with_origin(self.tree.node(id).origin),
        );
        false
    }

    /// 实际个数和期望不符时报告错误。返回实际个数。
    fn require(&mut self, id: ExprId, expected: Option<usize>, actual: usize) -> usize {
        let Some(wanted) = expected else { return actual };
        if wanted == actual {
            return actual;
        }
        let loc = self.tree.node(id).loc;
        let diagnostic = if actual == 0 {
            Diagnostic::error(&E0206_VOID_USED_AS_VALUE, Label::new(loc, "produces no value"))
        } else {
            Diagnostic::error(
                &E0207_WRONG_TUPLE_ARITY,
                Label::new(loc, format!("produces {actual} value(s)")),
            )
            .with_dynamic_message(format!("Expected {wanted} value(s) but found {actual}"))
        };
        self.diagnostics.report(diagnostic.with_origin(self.tree.node(id).origin));
        actual
    }
}

/// 检查阶段的公共入口。
pub fn check(root: ExprId, tree: &mut ExprTree, diagnostics: &mut DiagnosticBag) {
    Checker::new(tree, diagnostics).check_root(root);
    log::debug!("arity check finished");
}
