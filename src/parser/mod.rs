//! src/parser/mod.rs
//!
//! 语法分析的第一步：把逐行的词法单元组织成块结构。
//! 输出是一棵"原始树"：根块下面是 `<line>`，行里是词法单元、括号块、
//! 逗号分组以及缩进产生的 `<block>` 与 `do` 产生的 `<do>`。
//! 运算符的组合留给 combiner。

mod blocks;

use crate::diagnostics::DiagnosticBag;
use crate::expr::{ExprId, ExprTree, Value};
use crate::lexer::{LexLine, LexToken, TokenKind};
use crate::symbols::{BlockKind, RootEnv, TokenClass};
use crate::utils::{Loc, SourceId};

#[derive(Debug, Clone, Copy)]
struct OpenBlock {
    id: ExprId,
    kind: BlockKind,
    /// 块内各行的缩进列。根块和 `do` 块在看到第一行之前还不知道。
    level: Option<u32>,
}

/// 块栈。栈底永远是根块。
pub struct BlockParser<'a> {
    env: &'a RootEnv,
    tree: &'a mut ExprTree,
    diagnostics: &'a mut DiagnosticBag,
    stack: Vec<OpenBlock>,
    root: ExprId,
}

impl<'a> BlockParser<'a> {
    pub fn new(env: &'a RootEnv, tree: &'a mut ExprTree, diagnostics: &'a mut DiagnosticBag, source: SourceId) -> Self {
        let root = tree.alloc(env.block(BlockKind::Root), None, Loc::clamped(source, 1, 0));
        Self {
            env,
            tree,
            diagnostics,
            stack: vec![OpenBlock {
                id: root,
                kind: BlockKind::Root,
                level: None,
            }],
            root,
        }
    }

    pub fn parse(mut self, lines: Vec<LexLine>) -> ExprId {
        for line in lines {
            let Some(first) = line.tokens.first() else { continue };
            let loc = first.loc;
            self.handle_new_line(line.indent, loc);
            for token in line.tokens {
                self.handle_token(token);
            }
        }
        self.finish();
        log::debug!("block structure built: {} nodes", self.tree.len());
        self.root
    }

    fn handle_token(&mut self, token: LexToken) {
        let LexToken { kind, loc, .. } = token;
        let (class, value) = match kind {
            TokenKind::Do => {
                self.open(BlockKind::Do, None, loc);
                self.open(BlockKind::Line, None, loc);
                return;
            }
            TokenKind::Open(c) => {
                if let Some(kind) = BlockKind::from_open(c) {
                    self.open(kind, None, loc);
                    self.open(BlockKind::Comma, None, loc);
                }
                return;
            }
            TokenKind::Close(c) => {
                self.handle_close(c, loc);
                return;
            }
            TokenKind::Comma => {
                self.handle_comma(loc);
                return;
            }
            TokenKind::Ident(name) => (TokenClass::Identifier, Value::Name(name)),
            TokenKind::VirtualIdent(name) => (TokenClass::VirtualIdentifier, Value::Name(name)),
            TokenKind::Operator(op) => (TokenClass::Operator, Value::Name(op)),
            TokenKind::HashOperator(op) => (TokenClass::HashOperator, Value::Name(op)),
            TokenKind::Number(n) => (TokenClass::Number, Value::Number(n)),
            TokenKind::Str(s) => (TokenClass::Str, Value::Str(s)),
        };
        let node = self.tree.alloc(self.env.token(class), Some(value), loc);
        let top = self.top().id;
        self.tree.append_child(top, node);
    }

    // --- 块栈操作 ---

    fn top(&self) -> OpenBlock {
        self.stack[self.stack.len() - 1]
    }

    fn parent_kind(&self) -> Option<BlockKind> {
        self.stack.len().checked_sub(2).map(|i| self.stack[i].kind)
    }

    /// 新建一个块节点，挂到栈顶节点下面并压栈。
    fn open(&mut self, kind: BlockKind, level: Option<u32>, loc: Loc) -> ExprId {
        let node = self.tree.alloc(self.env.block(kind), None, loc);
        let top = self.top().id;
        self.tree.append_child(top, node);
        self.stack.push(OpenBlock { id: node, kind, level });
        node
    }

    fn pop(&mut self) -> Option<OpenBlock> {
        if self.stack.len() > 1 { self.stack.pop() } else { None }
    }

    /// 位于 `index` 之下、最近的有缩进层级的块的层级。
    fn enclosing_level(&self, index: usize) -> u32 {
        self.stack[..index]
            .iter()
            .rev()
            .filter(|b| b.kind.opens_scope())
            .find_map(|b| b.level)
            .unwrap_or(0)
    }

    fn has_open_bracket(&self) -> bool {
        self.stack.iter().any(|b| b.kind.is_bracket())
    }
}

/// 语法分析的公共入口：逐行词法单元 → 原始块树。
pub fn parse(
    lines: Vec<LexLine>,
    source: SourceId,
    env: &RootEnv,
    tree: &mut ExprTree,
    diagnostics: &mut DiagnosticBag,
) -> ExprId {
    BlockParser::new(env, tree, diagnostics, source).parse(lines)
}
