//! src/codegen/mod.rs
//!
//! 把检查过的表达式树降级成 [`ast`] 里的通用语句/表达式树。
//!
//! 能写成单个表达式的节点走 `expression.rs`，只能写成语句的节点
//! （`if`、`do`、`loop`、`try`、多值赋值……）走 `statement.rs`，
//! 它们的值通过 [`Dest`] 写进目标变量。

pub mod ast;
mod expression;
mod statement;
#[cfg(test)]
mod test;

use crate::diagnostics::codes::E0400_INTERNAL_COMPILER_ERROR;
use crate::diagnostics::{Diagnostic, DiagnosticBag, Label};
use crate::expr::{ExprId, ExprTree};
use crate::symbols::{BlockKind, Builtin, SymbolKind};
use crate::utils::Loc;
use ast::{Program, SourceSpan, Stmt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("cannot generate code for `{what}`")]
    Unsupported { what: String, loc: Loc },

    #[error("`{what}` has an unexpected shape: {reason}")]
    Malformed { what: String, reason: &'static str, loc: Loc },
}

impl CodegenError {
    pub fn into_diagnostic(self) -> Diagnostic {
        let loc = match &self {
            CodegenError::Unsupported { loc, .. } | CodegenError::Malformed { loc, .. } => *loc,
        };
        Diagnostic::error(&E0400_INTERNAL_COMPILER_ERROR, Label::new(loc, "while generating code for this"))
            .with_dynamic_message(self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodegenError>;

/// 一个节点的值该放到哪里。
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Dest {
    /// 语句位置，值被丢弃
    Discard,
    /// 依次赋给这些变量
    Into(Vec<String>),
    /// 作为函数的返回值
    Return,
}

impl Dest {
    pub(crate) fn into_name(name: impl Into<String>) -> Self {
        Dest::Into(vec![name.into()])
    }

    pub(crate) fn wants_value(&self) -> bool {
        !matches!(self, Dest::Discard)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpKind {
    Do,
    Loop,
}

/// `do`/`loop` 在跳转栈上的记录。
#[derive(Debug)]
struct JumpTarget {
    kind: JumpKind,
    label: String,
    /// `give` 把值放到这里
    results: Dest,
    /// `next` 把新的值赋给这些循环变量
    variables: Vec<String>,
    used: bool,
}

pub struct CodeGen<'t> {
    tree: &'t ExprTree,
    temps: usize,
    labels: usize,
    /// 每个宿主块上新分配的临时变量
    hosts: Vec<Vec<String>>,
    jumps: Vec<JumpTarget>,
}

impl<'t> CodeGen<'t> {
    pub fn new(tree: &'t ExprTree) -> Self {
        Self {
            tree,
            temps: 0,
            labels: 0,
            hosts: Vec::new(),
            jumps: Vec::new(),
        }
    }

    pub fn run(mut self, root: ExprId) -> Result<Program> {
        let body = self.sequence(root, Dest::Discard)?;
        Ok(Program { body })
    }

    fn fresh_temp(&mut self) -> String {
        self.temps += 1;
        let name = format!("$t{}", self.temps);
        if let Some(frame) = self.hosts.last_mut() {
            frame.push(name.clone());
        }
        name
    }

    fn fresh_label(&mut self, kind: JumpKind) -> String {
        self.labels += 1;
        match kind {
            JumpKind::Do => format!("do${}", self.labels),
            JumpKind::Loop => format!("loop${}", self.labels),
        }
    }

    /// 在宿主节点里生成语句。节点上登记的声明和期间分配的临时变量
    /// 合成一条声明语句放在最前面。
    fn with_host(
        &mut self,
        host: ExprId,
        f: impl FnOnce(&mut Self, &mut Vec<Stmt>) -> Result<()>,
    ) -> Result<Vec<Stmt>> {
        self.hosts.push(Vec::new());
        let mut body = Vec::new();
        let result = f(self, &mut body);
        let temps = self.hosts.pop().unwrap_or_default();
        result?;

        let mut names: Vec<String> = self
            .tree
            .node(host)
            .decls
            .as_ref()
            .map(|decls| decls.keys().cloned().collect())
            .unwrap_or_default();
        names.extend(temps);
        if !names.is_empty() {
            body.insert(0, Stmt::VarDecl(names));
        }
        Ok(body)
    }

    /// 块里的语句：前面的行丢弃结果，最后一行的值交给 `dest`。
    fn sequence(&mut self, id: ExprId, dest: Dest) -> Result<Vec<Stmt>> {
        let statements = self.tree.children(id).to_vec();
        self.with_host(id, |cg, out| {
            let Some((&last, rest)) = statements.split_last() else { return Ok(()) };
            for &statement in rest {
                cg.lower(statement, Dest::Discard, out)?;
            }
            cg.lower(last, dest, out)
        })
    }

    /// 分支与循环体：缩进块展开成它的语句，其它节点单独成为一条语句。
    fn block_body(&mut self, id: ExprId, dest: Dest) -> Result<Vec<Stmt>> {
        if matches!(self.tree.symbol(id).kind(), SymbolKind::Block(BlockKind::Block)) {
            return self.sequence(id, dest);
        }
        let mut out = Vec::new();
        self.lower(id, dest, &mut out)?;
        Ok(out)
    }

    /// 声明或赋值目标里出现的名字，元组按顺序展开。
    fn names_of(&self, target: ExprId) -> Result<Vec<String>> {
        if self.tree.tag_kind(target).is_some() {
            return match self.tree.name(target) {
                Some(name) => Ok(vec![name.to_string()]),
                None => Err(self.malformed(target, "a name without text")),
            };
        }
        match self.tree.builtin(target) {
            Some(Builtin::Var | Builtin::Const) => match self.tree.child(target, 0) {
                Some(inner) => self.names_of(inner),
                None => Err(self.malformed(target, "a declaration without a name")),
            },
            Some(Builtin::Tuple) => {
                let mut names = Vec::new();
                for &element in self.tree.children(target) {
                    names.extend(self.names_of(element)?);
                }
                Ok(names)
            }
            _ => Err(self.malformed(target, "only names can be declared here")),
        }
    }

    fn span_of(&self, id: ExprId) -> SourceSpan {
        let node = self.tree.node(id);
        SourceSpan {
            loc: node.loc,
            origin: node.origin,
        }
    }

    fn unsupported(&self, id: ExprId) -> CodegenError {
        CodegenError::Unsupported {
            what: self.tree.symbol(id).name().to_string(),
            loc: self.tree.node(id).loc,
        }
    }

    fn malformed(&self, id: ExprId, reason: &'static str) -> CodegenError {
        CodegenError::Malformed {
            what: self.tree.symbol(id).name().to_string(),
            reason,
            loc: self.tree.node(id).loc,
        }
    }
}

/// 代码生成阶段的公共入口。出错时报告一条内部错误并返回 `None`。
pub fn generate(root: ExprId, tree: &ExprTree, diagnostics: &mut DiagnosticBag) -> Option<Program> {
    match CodeGen::new(tree).run(root) {
        Ok(program) => {
            log::debug!("code generation produced {} top-level statement(s)", program.body.len());
            Some(program)
        }
        Err(error) => {
            diagnostics.report(error.into_diagnostic());
            None
        }
    }
}
