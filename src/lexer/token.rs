use crate::utils::Loc;
use std::fmt::{Display, Formatter, Result};

/// 一个带位置的词法单元。
#[derive(Debug, Clone, PartialEq)]
pub struct LexToken {
    pub kind: TokenKind,
    pub loc: Loc,
    /// 源码中占据的字符数，用于诊断下划线
    pub width: u32,
}

/// 逐行扫描得到的词法单元种类。
///
/// 这里不区分关键字：`if`、`var` 等都是普通标识符，它们的含义由当前作用域里的
/// 符号表决定。唯一的例外是 `do`，它直接开启一个块。
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// 反引号标识符，宏模板里的卫生名字
    VirtualIdent(String),
    Operator(String),
    /// `#` 开头的运算符，例如 `#macro`
    HashOperator(String),
    Number(f64),
    Str(String),
    Open(char),
    Close(char),
    Comma,
    Do,
}

impl TokenKind {
    /// 一个用于错误报告的简单字符串表示。
    pub fn to_string_for_error(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::VirtualIdent(name) => format!("virtual identifier `` `{name} ``"),
            TokenKind::Operator(op) | TokenKind::HashOperator(op) => format!("operator `{op}`"),
            TokenKind::Number(n) => format!("number `{n}`"),
            TokenKind::Str(_) => "a string literal".to_string(),
            TokenKind::Open(c) | TokenKind::Close(c) => format!("`{c}`"),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::Do => "`do`".to_string(),
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}", self.to_string_for_error())
    }
}

/// 一个非空的逻辑行。
#[derive(Debug, Clone, PartialEq)]
pub struct LexLine {
    /// 行首缩进的列数（制表符已按 tab size 展开）
    pub indent: u32,
    pub line: u32,
    pub tokens: Vec<LexToken>,
}
