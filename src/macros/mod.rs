//! src/macros/mod.rs
//!
//! 宏展开阶段。
//!
//! 展开按后序进行：先展开子节点，再展开节点本身。一个节点展开后原地变成
//! 展开结果（保留自己的 id 和在父节点中的位置），然后它的新子节点会再被展开一遍，
//! 节点本身也会再检查一次，直到它不再是宏调用为止。
//! 带 QUOTING 标志的节点（`#macro`、`#quote`）的子节点不展开。

pub mod hygiene;
pub mod template;
#[cfg(test)]
mod test;

use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, DiagnosticBag, Label};
use crate::expr::{ExprId, ExprTree, Value};
use crate::symbols::{Builtin, RootEnv, SymbolFlags, SymbolKind, TagKind};
use crate::utils::Loc;
use hygiene::NameGen;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use thiserror::Error;

/// 同一个节点连续展开的轮数上限，也是嵌套展开的深度上限。
pub const EXPANSION_LIMIT: usize = 256;

/// 一次展开的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Unchanged,
    /// 从父节点上删除这个节点
    Delete,
    /// 用这棵（没有父节点的）子树替换调用节点
    Replace(ExprId),
}

#[derive(Debug, Clone, Error)]
pub enum MacroError {
    #[error("{0}")]
    Message(String),
    #[error("macro `{name}` expects {expected} argument(s), found {found}")]
    ArgumentCount { name: String, expected: usize, found: usize },
}

impl MacroError {
    fn into_diagnostic(self, loc: Loc) -> Diagnostic {
        let code = match self {
            MacroError::ArgumentCount { .. } => &E0306_MACRO_ARGUMENT_COUNT,
            MacroError::Message(_) => &E0300_MACRO_FAILED,
        };
        let message = self.to_string();
        Diagnostic::error(code, Label::new(loc, "in this macro invocation")).with_dynamic_message(message)
    }
}

/// 宏的展开例程。模板宏和宿主注册的原生宏都实现它。
pub trait MacroExpander: fmt::Debug {
    fn expand(&self, cx: &mut MacroContext<'_>, node: ExprId) -> Result<Expansion, MacroError>;

    /// 展开失败时附加在诊断里的说明
    fn describe(&self, _tree: &ExprTree) -> Option<String> {
        None
    }
}

/// 展开例程能看到的东西：表达式树和根环境，以及几个构造节点的辅助函数。
pub struct MacroContext<'a> {
    pub tree: &'a mut ExprTree,
    pub env: &'a RootEnv,
}

impl MacroContext<'_> {
    pub fn operands(&self, node: ExprId) -> Vec<ExprId> {
        self.tree.children(node).to_vec()
    }

    /// 一个不需要声明的外部名字。
    pub fn external(&mut self, name: &str, loc: Loc) -> ExprId {
        self.tree
            .alloc(self.env.tag(TagKind::External), Some(Value::Name(name.to_string())), loc)
    }

    pub fn call(&mut self, callee: ExprId, arguments: &[ExprId], loc: Loc) -> ExprId {
        let call = self.tree.alloc(self.env.builtin(Builtin::Call), None, loc);
        self.tree.append_child(call, callee);
        for &argument in arguments {
            self.tree.append_child(call, argument);
        }
        call
    }

    pub fn member(&mut self, object: ExprId, property: ExprId, loc: Loc) -> ExprId {
        let member = self.tree.alloc(self.env.builtin(Builtin::Member), None, loc);
        self.tree.append_child(member, object);
        self.tree.append_child(member, property);
        member
    }
}

/// 把 `m x` 展开成对外部函数的调用 `callee(x)`。元组参数展开成多个实参。
#[derive(Debug, Clone)]
pub struct CallMacro {
    callee: String,
}

impl CallMacro {
    pub fn new(callee: impl Into<String>) -> Self {
        Self { callee: callee.into() }
    }
}

impl MacroExpander for CallMacro {
    fn expand(&self, cx: &mut MacroContext<'_>, node: ExprId) -> Result<Expansion, MacroError> {
        let loc = cx.tree.loc(node);
        let mut arguments = Vec::new();
        for operand in cx.operands(node) {
            if cx.tree.is(operand, Builtin::Tuple) {
                arguments.extend(cx.tree.take_children(operand));
            } else {
                cx.tree.detach(operand);
                arguments.push(operand);
            }
        }
        let callee = cx.external(&self.callee, loc);
        Ok(Expansion::Replace(cx.call(callee, &arguments, loc)))
    }

    fn describe(&self, _tree: &ExprTree) -> Option<String> {
        Some(format!("native macro calling `{}`", self.callee))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandOptions<'s> {
    /// 展开失败时在诊断里附上宏的定义和调用所在的源码行
    pub trace_failures: bool,
    pub source_text: Option<&'s str>,
}

pub struct Expander<'a> {
    env: &'a RootEnv,
    tree: &'a mut ExprTree,
    diagnostics: &'a mut DiagnosticBag,
    options: ExpandOptions<'a>,
    names: NameGen,
    depth: usize,
    limit_reported: bool,
}

impl<'a> Expander<'a> {
    pub fn new(
        env: &'a RootEnv,
        tree: &'a mut ExprTree,
        diagnostics: &'a mut DiagnosticBag,
        options: ExpandOptions<'a>,
    ) -> Self {
        Self {
            env,
            tree,
            diagnostics,
            options,
            names: NameGen::new(),
            depth: 0,
            limit_reported: false,
        }
    }

    pub fn expand(&mut self, root: ExprId) {
        self.expand_subtree(root);
    }

    fn expand_subtree(&mut self, id: ExprId) {
        if !self.tree.symbol(id).flags().contains(SymbolFlags::QUOTING) {
            for child in self.tree.children(id).to_vec() {
                self.expand_subtree(child);
            }
        }
        self.expand_node(id);
    }

    fn expand_node(&mut self, id: ExprId) {
        let mut rounds = 0usize;
        loop {
            let symbol = self.tree.symbol(id).clone();
            let result = match symbol.kind() {
                SymbolKind::Builtin(builtin) if symbol.flags().contains(SymbolFlags::MACRO) => {
                    self.expand_builtin(*builtin, id)
                }
                SymbolKind::Macro(expander) => self.invoke(expander.clone(), id),
                _ => return,
            };

            let replacement = match result {
                Ok(Expansion::Unchanged) => return,
                Ok(Expansion::Delete) => {
                    self.tree.detach(id);
                    return;
                }
                Ok(Expansion::Replace(replacement)) => replacement,
                Err(diagnostic) => {
                    self.diagnostics.report(diagnostic);
                    return;
                }
            };

            rounds += 1;
            log::trace!("expanding `{}` (round {rounds})", symbol.name());
            if rounds > EXPANSION_LIMIT || self.depth > EXPANSION_LIMIT {
                self.report_limit(id);
                return;
            }

            self.tree.transform_into(id, replacement);
            for diagnostic in hygiene::rename_virtuals(self.tree, self.env, id, &mut self.names) {
                self.diagnostics.report(diagnostic);
            }

            if !self.tree.symbol(id).flags().contains(SymbolFlags::QUOTING) {
                self.depth += 1;
                for child in self.tree.children(id).to_vec() {
                    self.expand_subtree(child);
                }
                self.depth -= 1;
            }
        }
    }

    fn expand_builtin(&mut self, builtin: Builtin, id: ExprId) -> Result<Expansion, Diagnostic> {
        let (loc, origin) = (self.tree.node(id).loc, self.tree.node(id).origin);
        match builtin {
            // 定义已经在组合阶段登记到键作用域里了
            Builtin::DefMacro => Ok(Expansion::Delete),
            Builtin::Quote | Builtin::Unquote => Err(Diagnostic::error(
                &E0304_MISPLACED_QUOTE,
                Label::new(loc, "only valid inside a macro template"),
            )
            .with_dynamic_message(format!("Misplaced `{}`", builtin.name()))
            .with_origin(origin)),
            Builtin::At => {
                // `@x` 是 `this.x`
                let Some(property) = self.tree.child(id, 0) else {
                    return Ok(Expansion::Unchanged);
                };
                self.tree.detach(property);
                let mut cx = MacroContext {
                    tree: &mut *self.tree,
                    env: self.env,
                };
                let this = cx.external("this", loc);
                Ok(Expansion::Replace(cx.member(this, property, loc)))
            }
            _ => Ok(Expansion::Unchanged),
        }
    }

    fn invoke(&mut self, expander: Rc<dyn MacroExpander>, id: ExprId) -> Result<Expansion, Diagnostic> {
        let (loc, origin) = (self.tree.node(id).loc, self.tree.node(id).origin);
        let outcome = {
            let mut cx = MacroContext {
                tree: &mut *self.tree,
                env: self.env,
            };
            panic::catch_unwind(AssertUnwindSafe(|| expander.expand(&mut cx, id)))
        };

        let diagnostic = match outcome {
            Ok(Ok(expansion)) => return Ok(expansion),
            Ok(Err(error)) => error.into_diagnostic(loc),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Diagnostic::error(&E0301_MACRO_PANICKED, Label::new(loc, "in this macro invocation"))
                    .with_note(format!("panic: {reason}"))
            }
        };
        Err(self.traced(diagnostic.with_origin(origin), expander.as_ref(), loc))
    }

    fn traced(&self, diagnostic: Diagnostic, expander: &dyn MacroExpander, loc: Loc) -> Diagnostic {
        if !self.options.trace_failures {
            return diagnostic;
        }
        let mut diagnostic = diagnostic;
        if let Some(description) = expander.describe(self.tree) {
            diagnostic = diagnostic.with_note(format!("while expanding {description}"));
        }
        let line = self
            .options
            .source_text
            .and_then(|text| text.lines().nth(loc.line().saturating_sub(1) as usize));
        if let Some(line) = line {
            diagnostic = diagnostic.with_note(format!("invoked at line {}: {}", loc.line(), line.trim()));
        }
        diagnostic
    }

    fn report_limit(&mut self, id: ExprId) {
        if self.limit_reported {
            return;
        }
        self.limit_reported = true;
        let node = self.tree.node(id);
        self.diagnostics.report(
            Diagnostic::error(
                &E0305_EXPANSION_LIMIT,
                Label::new(node.loc, format!("still expanding after {EXPANSION_LIMIT} rounds")),
            )
            .with_origin(node.origin),
        );
    }
}

/// 宏展开阶段的公共入口。
pub fn expand(
    root: ExprId,
    env: &RootEnv,
    tree: &mut ExprTree,
    diagnostics: &mut DiagnosticBag,
    options: ExpandOptions<'_>,
) {
    Expander::new(env, tree, diagnostics, options).expand(root);
    log::debug!("macro expansion finished: {} nodes", tree.len());
}
