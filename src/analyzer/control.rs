// src/analyzer/control.rs
//
// 控制结构与跳转语句的检查。

use super::{Checker, Context};
use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, Label};
use crate::expr::ExprId;
use crate::symbols::Builtin;

impl Checker<'_> {
    pub(super) fn check_do(&mut self, id: ExprId, expected: Option<usize>, cx: Context) -> usize {
        let inner = Context {
            end_arity: Some(expected),
            ..cx
        };
        self.check_sequence(id, expected, inner)
    }

    /// 有 `else` 时两个分支都按期望检查；没有 `else` 的 `if` 不能当值用。
    pub(super) fn check_if(&mut self, id: ExprId, children: &[ExprId], expected: Option<usize>, cx: Context) -> usize {
        let Some((&condition, branches)) = children.split_first() else { return expected.unwrap_or(0) };
        self.check(condition, Some(1), cx);

        let then_branch = branches.first().copied();
        let else_branch = branches.iter().copied().find(|&c| self.tree.is(c, Builtin::Else));

        if else_branch.is_none() && expected.is_some_and(|n| n > 0) {
            let loc = self.tree.node(id).loc;
            self.diagnostics.report(
                Diagnostic::error(&E0206_VOID_USED_AS_VALUE, Label::new(loc, "this `if` has no `else`"))
                    .with_dynamic_message("`if` without `else` used as a value")
                    .with_origin(self.tree.node(id).origin),
            );
            if let Some(then_branch) = then_branch {
                self.check(then_branch, None, cx);
            }
            return expected.unwrap_or(0);
        }

        let then_count = then_branch.map(|b| self.check(b, expected, cx));
        let else_count = else_branch.map(|b| self.check(b, expected, cx));
        match (expected, then_count, else_count) {
            (Some(n), _, _) => n,
            (None, Some(a), Some(b)) if a == b => a,
            _ => 0,
        }
    }

    /// `loop [names = init] body`：`next` 提供新的循环变量，`give`/`end` 离开循环。
    pub(super) fn check_loop(&mut self, children: &[ExprId], expected: Option<usize>, cx: Context) -> usize {
        let (head, body) = match *children {
            [body] => (None, body),
            [head, body] => (Some(head), body),
            _ => return expected.unwrap_or(0),
        };
        let variables = match head {
            Some(head) => {
                self.check(head, None, cx);
                self.tree.child(head, 0).map_or(0, |target| self.target_width(target))
            }
            None => 0,
        };
        let inner = Context {
            end_arity: Some(expected),
            loop_arity: Some(variables),
            ..cx
        };
        self.check(body, None, inner);
        expected.unwrap_or(0)
    }

    pub(super) fn check_try(&mut self, children: &[ExprId], expected: Option<usize>, cx: Context) -> usize {
        let mut counts = Vec::new();
        for &child in children {
            if self.tree.is(child, Builtin::Finally) {
                self.check(child, None, cx);
            } else {
                counts.push(self.check(child, expected, cx));
            }
        }
        match expected {
            Some(n) => n,
            None if counts.windows(2).all(|w| w[0] == w[1]) && counts.len() > 1 => counts[0],
            None => 0,
        }
    }

    /// 跳转语句必须在对应的目标里，携带的值个数要和目标期望的一致。
    pub(super) fn check_jump(&mut self, id: ExprId, builtin: Builtin, children: &[ExprId], cx: Context) {
        let operand = children.first().copied();
        match builtin {
            Builtin::Give | Builtin::End => {
                let Some(target) = cx.end_arity else {
                    self.report_jump(id, builtin, "`do` or `loop`");
                    return;
                };
                match (operand, target) {
                    (Some(value), target) => {
                        self.check(value, target, cx);
                    }
                    (None, Some(n)) if n > 0 => {
                        let loc = self.tree.node(id).loc;
                        self.diagnostics.report(
                            Diagnostic::error(&E0206_VOID_USED_AS_VALUE, Label::new(loc, "leaves without a value"))
                                .with_dynamic_message(format!("`{}` must provide {n} value(s)", builtin.name()))
                                .with_origin(self.tree.node(id).origin),
                        );
                    }
                    (None, _) => {}
                }
            }
            Builtin::Next => {
                let Some(variables) = cx.loop_arity else {
                    self.report_jump(id, builtin, "`loop`");
                    return;
                };
                if let Some(value) = operand {
                    self.check(value, Some(variables), cx);
                }
            }
            Builtin::Return => {
                if !cx.in_function {
                    let loc = self.tree.node(id).loc;
                    self.diagnostics.report(
                        Diagnostic::error(&E0205_RETURN_OUTSIDE_FUNCTION, Label::new(loc, "not inside `fn`"))
                            .with_origin(self.tree.node(id).origin),
                    );
                    return;
                }
                if let Some(value) = operand {
                    self.check(value, Some(1), cx);
                }
            }
            _ => {
                if let Some(value) = operand {
                    self.check(value, Some(1), cx);
                }
            }
        }
    }

    fn report_jump(&mut self, id: ExprId, builtin: Builtin, target: &str) {
        let loc = self.tree.node(id).loc;
        self.diagnostics.report(
            Diagnostic::error(&E0204_JUMP_OUTSIDE_TARGET, Label::new(loc, format!("not inside {target}")))
                .with_dynamic_message(format!("`{}` used outside of {target}", builtin.name()))
                .with_origin(self.tree.node(id).origin),
        );
    }
}
