//! src/symbols/mod.rs
//!
//! 符号描述了一个词法单元或运算符"是什么"：它属于哪一类、需要几个操作数、
//! 优先级多少、有哪些行为标志。符号在构造之后不可变，通过 `Rc` 被许多节点共享。

pub mod env;
pub mod scope;
#[cfg(test)]
mod test;

use crate::macros::MacroExpander;
use bitflags::bitflags;
use std::fmt;
use std::rc::Rc;

pub use env::RootEnv;
pub use scope::{Declaration, ScopeArena, ScopeId};

/// 隐式调用 `<call>` 与下标 `<element>` 的优先级。
pub const CALL_PRECEDENCE: u8 = 90;

// --- 1. 块、词素与标签的种类 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Root,
    Paren,
    Square,
    Curly,
    Block,
    Do,
    Line,
    Comma,
}

impl BlockKind {
    pub const ALL: [BlockKind; 8] = [
        BlockKind::Root,
        BlockKind::Paren,
        BlockKind::Square,
        BlockKind::Curly,
        BlockKind::Block,
        BlockKind::Do,
        BlockKind::Line,
        BlockKind::Comma,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Root => "<root>",
            BlockKind::Paren => "<paren>",
            BlockKind::Square => "<square>",
            BlockKind::Curly => "<curly>",
            BlockKind::Block => "<block>",
            BlockKind::Do => "<do>",
            BlockKind::Line => "<line>",
            BlockKind::Comma => "<comma>",
        }
    }

    pub fn from_open(c: char) -> Option<Self> {
        match c {
            '(' => Some(BlockKind::Paren),
            '[' => Some(BlockKind::Square),
            '{' => Some(BlockKind::Curly),
            _ => None,
        }
    }

    pub fn close_char(self) -> Option<char> {
        match self {
            BlockKind::Paren => Some(')'),
            BlockKind::Square => Some(']'),
            BlockKind::Curly => Some('}'),
            _ => None,
        }
    }

    pub fn is_bracket(self) -> bool {
        matches!(self, BlockKind::Paren | BlockKind::Square | BlockKind::Curly)
    }

    /// 根块、缩进块和 `do` 块会开启新的变量作用域，同时也是新的键作用域层。
    pub fn opens_scope(self) -> bool {
        matches!(self, BlockKind::Root | BlockKind::Block | BlockKind::Do)
    }
}

/// 尚未解析的词素的类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Identifier,
    VirtualIdentifier,
    Operator,
    HashOperator,
    Number,
    Str,
}

impl TokenClass {
    pub const ALL: [TokenClass; 6] = [
        TokenClass::Identifier,
        TokenClass::VirtualIdentifier,
        TokenClass::Operator,
        TokenClass::HashOperator,
        TokenClass::Number,
        TokenClass::Str,
    ];
}

/// 标签（标识符）的变体：{具体, 虚拟} × {声明, 使用} × {可变, 常量}，外加"外部"。
///
/// 外围结构（`var`、`const`、`#external`、反引号）通过下面的转换函数
/// 改变一个标签的变体。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Concrete { declaration: bool, constant: bool },
    Virtual { declaration: bool, constant: bool },
    External,
}

impl TagKind {
    pub const USE: TagKind = TagKind::Concrete {
        declaration: false,
        constant: false,
    };

    pub const ALL: [TagKind; 9] = [
        TagKind::Concrete { declaration: false, constant: false },
        TagKind::Concrete { declaration: false, constant: true },
        TagKind::Concrete { declaration: true, constant: false },
        TagKind::Concrete { declaration: true, constant: true },
        TagKind::Virtual { declaration: false, constant: false },
        TagKind::Virtual { declaration: false, constant: true },
        TagKind::Virtual { declaration: true, constant: false },
        TagKind::Virtual { declaration: true, constant: true },
        TagKind::External,
    ];

    pub fn is_virtual(self) -> bool {
        matches!(self, TagKind::Virtual { .. })
    }

    pub fn is_declaration(self) -> bool {
        match self {
            TagKind::Concrete { declaration, .. } | TagKind::Virtual { declaration, .. } => declaration,
            TagKind::External => false,
        }
    }

    pub fn is_constant(self) -> bool {
        match self {
            TagKind::Concrete { constant, .. } | TagKind::Virtual { constant, .. } => constant,
            TagKind::External => false,
        }
    }

    pub fn to_constant_tag(self) -> TagKind {
        match self {
            TagKind::Concrete { declaration, .. } => TagKind::Concrete { declaration, constant: true },
            TagKind::Virtual { declaration, .. } => TagKind::Virtual { declaration, constant: true },
            TagKind::External => TagKind::External,
        }
    }

    pub fn to_tag_declaration(self) -> TagKind {
        match self {
            TagKind::Concrete { constant, .. } => TagKind::Concrete { declaration: true, constant },
            TagKind::Virtual { constant, .. } => TagKind::Virtual { declaration: true, constant },
            TagKind::External => TagKind::External,
        }
    }

    pub fn to_virtual_tag(self) -> TagKind {
        match self {
            TagKind::Concrete { declaration, constant } | TagKind::Virtual { declaration, constant } => {
                TagKind::Virtual { declaration, constant }
            }
            TagKind::External => TagKind::External,
        }
    }

    pub fn to_external_tag(self) -> TagKind {
        TagKind::External
    }

    /// 卫生化重命名之后，虚拟标签变回具体标签。
    pub fn to_concrete(self) -> TagKind {
        match self {
            TagKind::Concrete { declaration, constant } | TagKind::Virtual { declaration, constant } => {
                TagKind::Concrete { declaration, constant }
            }
            TagKind::External => TagKind::External,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TagKind::Concrete { declaration: false, constant: false } => "tag",
            TagKind::Concrete { declaration: false, constant: true } => "const-tag",
            TagKind::Concrete { declaration: true, constant: false } => "tag-decl",
            TagKind::Concrete { declaration: true, constant: true } => "const-tag-decl",
            TagKind::Virtual { declaration: false, constant: false } => "virtual-tag",
            TagKind::Virtual { declaration: false, constant: true } => "virtual-const-tag",
            TagKind::Virtual { declaration: true, constant: false } => "virtual-tag-decl",
            TagKind::Virtual { declaration: true, constant: true } => "virtual-const-tag-decl",
            TagKind::External => "external-tag",
        }
    }
}

// --- 2. 内建运算符与关键字 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Assign,
    Pair,
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Not,
    Member,
    Call,
    Element,
    Tuple,
    Array,
    Object,
    New,
    Var,
    Const,
    External,
    If,
    Else,
    While,
    Loop,
    Give,
    Next,
    End,
    Return,
    Throw,
    Try,
    Catch,
    Finally,
    Fn,
    DefMacro,
    Quote,
    Unquote,
    At,
}

impl Builtin {
    pub const ALL: [Builtin; 44] = [
        Builtin::Assign,
        Builtin::Pair,
        Builtin::Or,
        Builtin::And,
        Builtin::Eq,
        Builtin::NotEq,
        Builtin::Lt,
        Builtin::Le,
        Builtin::Gt,
        Builtin::Ge,
        Builtin::Add,
        Builtin::Sub,
        Builtin::Mul,
        Builtin::Div,
        Builtin::Mod,
        Builtin::Neg,
        Builtin::Not,
        Builtin::Member,
        Builtin::Call,
        Builtin::Element,
        Builtin::Tuple,
        Builtin::Array,
        Builtin::Object,
        Builtin::New,
        Builtin::Var,
        Builtin::Const,
        Builtin::External,
        Builtin::If,
        Builtin::Else,
        Builtin::While,
        Builtin::Loop,
        Builtin::Give,
        Builtin::Next,
        Builtin::End,
        Builtin::Return,
        Builtin::Throw,
        Builtin::Try,
        Builtin::Catch,
        Builtin::Finally,
        Builtin::Fn,
        Builtin::DefMacro,
        Builtin::Quote,
        Builtin::Unquote,
        Builtin::At,
    ];

    /// 规范名称，也是树的 s-表达式渲染中使用的名字。
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Assign => "=",
            Builtin::Pair => ":",
            Builtin::Or => "||",
            Builtin::And => "&&",
            Builtin::Eq => "==",
            Builtin::NotEq => "!=",
            Builtin::Lt => "<",
            Builtin::Le => "<=",
            Builtin::Gt => ">",
            Builtin::Ge => ">=",
            Builtin::Add => "+",
            Builtin::Sub => "-",
            Builtin::Mul => "*",
            Builtin::Div => "/",
            Builtin::Mod => "%",
            Builtin::Neg => "neg",
            Builtin::Not => "!",
            Builtin::Member => ".",
            Builtin::Call => "<call>",
            Builtin::Element => "<element>",
            Builtin::Tuple => "<tuple>",
            Builtin::Array => "<array>",
            Builtin::Object => "<object>",
            Builtin::New => "new",
            Builtin::Var => "var",
            Builtin::Const => "const",
            Builtin::External => "#external",
            Builtin::If => "if",
            Builtin::Else => "else",
            Builtin::While => "while",
            Builtin::Loop => "loop",
            Builtin::Give => "give",
            Builtin::Next => "next",
            Builtin::End => "end",
            Builtin::Return => "return",
            Builtin::Throw => "throw",
            Builtin::Try => "try",
            Builtin::Catch => "catch",
            Builtin::Finally => "finally",
            Builtin::Fn => "fn",
            Builtin::DefMacro => "#macro",
            Builtin::Quote => "#quote",
            Builtin::Unquote => "#unquote",
            Builtin::At => "@",
        }
    }

    pub fn arity(self) -> Arity {
        use Builtin::*;
        match self {
            Assign => Arity::infix().right_assoc(),
            Pair | Or | And | Eq | NotEq | Lt | Le | Gt | Ge | Add | Sub | Mul | Div | Mod | Member
            | Element => Arity::infix(),
            Neg | Not | New | Throw | Finally | Quote => Arity::prefix(1, 1),
            Call | Tuple | Array | Object => Arity::sequence(),
            Var | Const | External | Unquote | At => Arity::prefix(1, 1).with_atoms(1),
            If => Arity::prefix(2, 2).with_dependents(&[Builtin::Else]),
            Else => Arity::prefix(1, 1),
            While => Arity::prefix(2, 2),
            Loop => Arity::prefix(1, 2),
            Give | Next | Return => Arity::prefix(0, 1),
            End => Arity::prefix(0, 0),
            Try => Arity::prefix(1, 1).with_dependents(&[Builtin::Catch, Builtin::Finally]),
            Catch | Fn => Arity::prefix(2, 2).with_atoms(1),
            DefMacro => Arity::prefix(3, 3).with_atoms(2),
        }
    }

    pub fn data(self) -> SymbolData {
        use Builtin::*;
        let (precedence, flags) = match self {
            Assign => (10, SymbolFlags::empty()),
            Pair => (8, SymbolFlags::empty()),
            Or => (20, SymbolFlags::empty()),
            And => (30, SymbolFlags::empty()),
            Eq | NotEq => (40, SymbolFlags::empty()),
            Lt | Le | Gt | Ge => (50, SymbolFlags::empty()),
            Add | Sub => (60, SymbolFlags::empty()),
            Mul | Div | Mod => (70, SymbolFlags::empty()),
            Neg | Not => (80, SymbolFlags::empty()),
            Member => (100, SymbolFlags::ASSIGNABLE),
            Call => (CALL_PRECEDENCE, SymbolFlags::empty()),
            Element => (CALL_PRECEDENCE, SymbolFlags::ASSIGNABLE),
            Tuple | Array | Object => (0, SymbolFlags::empty()),
            New => (CALL_PRECEDENCE - 1, SymbolFlags::empty()),
            Var | Const => (95, SymbolFlags::DECLARES | SymbolFlags::ASSIGNABLE),
            External => (95, SymbolFlags::DECLARES),
            If | While => (0, SymbolFlags::empty()),
            Else | Finally => (0, SymbolFlags::DEPENDENT_CLAUSE),
            Catch => (0, SymbolFlags::DEPENDENT_CLAUSE | SymbolFlags::OPENS_SCOPE),
            Loop => (0, SymbolFlags::OPENS_SCOPE | SymbolFlags::HOSTS_DECLARATIONS),
            Give | Next | End | Return | Throw => (0, SymbolFlags::JUMP),
            Try => (0, SymbolFlags::empty()),
            Fn => (0, SymbolFlags::OPENS_SCOPE | SymbolFlags::HOSTS_DECLARATIONS),
            DefMacro => (0, SymbolFlags::MACRO | SymbolFlags::QUOTING),
            Quote => (0, SymbolFlags::MACRO | SymbolFlags::QUOTING),
            Unquote | At => (95, SymbolFlags::MACRO),
        };
        SymbolData { precedence, flags }
    }

    /// 同一个拼写在前缀位置时对应的符号，例如二元 `-` 对应一元取负。
    pub fn prefix_form(self) -> Option<Builtin> {
        match self {
            Builtin::Sub => Some(Builtin::Neg),
            _ => None,
        }
    }

    /// 属于前奏（prelude）的宏，只有在加载前奏时才进入根键作用域。
    pub fn is_prelude(self) -> bool {
        matches!(self, Builtin::DefMacro | Builtin::Quote | Builtin::Unquote | Builtin::At)
    }

    /// 源码里可以直接写出的拼写。隐式节点（`<call>` 等）没有拼写。
    pub fn spellings(self) -> &'static [&'static str] {
        match self {
            Builtin::Or => &["||", "or"],
            Builtin::And => &["&&", "and"],
            Builtin::Not => &["!", "not"],
            Builtin::Neg | Builtin::Call | Builtin::Element | Builtin::Tuple | Builtin::Array | Builtin::Object => &[],
            Builtin::Assign => &["="],
            Builtin::Pair => &[":"],
            Builtin::Eq => &["=="],
            Builtin::NotEq => &["!="],
            Builtin::Lt => &["<"],
            Builtin::Le => &["<="],
            Builtin::Gt => &[">"],
            Builtin::Ge => &[">="],
            Builtin::Add => &["+"],
            Builtin::Sub => &["-"],
            Builtin::Mul => &["*"],
            Builtin::Div => &["/"],
            Builtin::Mod => &["%"],
            Builtin::Member => &["."],
            Builtin::New => &["new"],
            Builtin::Var => &["var"],
            Builtin::Const => &["const"],
            Builtin::External => &["#external"],
            Builtin::If => &["if"],
            Builtin::Else => &["else"],
            Builtin::While => &["while"],
            Builtin::Loop => &["loop"],
            Builtin::Give => &["give"],
            Builtin::Next => &["next"],
            Builtin::End => &["end"],
            Builtin::Return => &["return"],
            Builtin::Throw => &["throw"],
            Builtin::Try => &["try"],
            Builtin::Catch => &["catch"],
            Builtin::Finally => &["finally"],
            Builtin::Fn => &["fn"],
            Builtin::DefMacro => &["#macro"],
            Builtin::Quote => &["#quote"],
            Builtin::Unquote => &["#unquote"],
            Builtin::At => &["@"],
        }
    }
}

// --- 3. Arity 与行为数据 ---

/// 操作数个数与结合性的约束。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    /// 是否需要左操作数（中缀运算符）
    pub left: bool,
    pub right_min: u8,
    pub right_max: u8,
    pub right_assoc: bool,
    /// 元组、调用这类扁平序列，操作数个数不固定
    pub sequence: bool,
    /// 前几个右操作数只接受单个原子（名字、括号块），而不是完整表达式
    pub leading_atoms: u8,
    /// 可以吸收的尾随从属子句，例如 `if` 的 `else`
    pub dependents: &'static [Builtin],
}

impl Arity {
    pub const NONE: Arity = Arity {
        left: false,
        right_min: 0,
        right_max: 0,
        right_assoc: false,
        sequence: false,
        leading_atoms: 0,
        dependents: &[],
    };

    pub const fn infix() -> Self {
        Arity {
            left: true,
            right_min: 1,
            right_max: 1,
            ..Arity::NONE
        }
    }

    pub const fn prefix(min: u8, max: u8) -> Self {
        Arity {
            right_min: min,
            right_max: max,
            ..Arity::NONE
        }
    }

    pub const fn sequence() -> Self {
        Arity {
            sequence: true,
            ..Arity::NONE
        }
    }

    pub const fn right_assoc(mut self) -> Self {
        self.right_assoc = true;
        self
    }

    pub const fn with_atoms(mut self, count: u8) -> Self {
        self.leading_atoms = count;
        self
    }

    pub const fn with_dependents(mut self, dependents: &'static [Builtin]) -> Self {
        self.dependents = dependents;
        self
    }

    /// 不计从属子句时的最少操作数。
    pub fn min_operands(&self) -> usize {
        self.left as usize + self.right_min as usize
    }

    /// 不计从属子句时的最多操作数。
    pub fn max_operands(&self) -> usize {
        self.left as usize + self.right_max as usize
    }

    /// 包括所有从属子句在内的最多子节点数。
    pub fn max_with_dependents(&self) -> usize {
        self.max_operands() + self.dependents.len()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SymbolFlags: u16 {
        const OPENS_SCOPE = 1 << 0;
        const HOSTS_DECLARATIONS = 1 << 1;
        const JUMP = 1 << 2;
        const ASSIGNABLE = 1 << 3;
        const MACRO = 1 << 4;
        const QUOTING = 1 << 5;
        const DEPENDENT_CLAUSE = 1 << 6;
        const DECLARES = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolData {
    pub precedence: u8,
    pub flags: SymbolFlags,
}

// --- 4. Symbol ---

#[derive(Clone)]
pub enum SymbolKind {
    Block(BlockKind),
    Value,
    Token(TokenClass),
    /// "none"：不代表任何东西，用作模板中的占位符
    Nothing,
    Builtin(Builtin),
    Macro(Rc<dyn MacroExpander>),
    Tag(TagKind),
}

impl fmt::Debug for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Block(kind) => write!(f, "Block({kind:?})"),
            SymbolKind::Value => write!(f, "Value"),
            SymbolKind::Token(class) => write!(f, "Token({class:?})"),
            SymbolKind::Nothing => write!(f, "Nothing"),
            SymbolKind::Builtin(builtin) => write!(f, "Builtin({builtin:?})"),
            SymbolKind::Macro(expander) => write!(f, "Macro({expander:?})"),
            SymbolKind::Tag(kind) => write!(f, "Tag({kind:?})"),
        }
    }
}

#[derive(Debug)]
pub struct Symbol {
    name: String,
    kind: SymbolKind,
    arity: Arity,
    data: Option<SymbolData>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, arity: Arity, data: Option<SymbolData>) -> Self {
        Self {
            name: name.into(),
            kind,
            arity,
            data,
        }
    }

    pub fn builtin(builtin: Builtin) -> Self {
        Self::new(builtin.name(), SymbolKind::Builtin(builtin), builtin.arity(), Some(builtin.data()))
    }

    /// 用户宏：像调用一样接收一个操作数（多参数时是一个元组）。
    pub fn user_macro(name: impl Into<String>, params: usize, expander: Rc<dyn MacroExpander>) -> Self {
        let arity = if params == 0 { Arity::prefix(0, 0) } else { Arity::prefix(1, 1) };
        Self::native_macro(name, arity, expander)
    }

    pub fn native_macro(name: impl Into<String>, arity: Arity, expander: Rc<dyn MacroExpander>) -> Self {
        let data = SymbolData {
            precedence: if arity.left { CALL_PRECEDENCE } else { CALL_PRECEDENCE - 1 },
            flags: SymbolFlags::MACRO,
        };
        Self::new(name, SymbolKind::Macro(expander), arity, Some(data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &SymbolKind {
        &self.kind
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn data(&self) -> Option<&SymbolData> {
        self.data.as_ref()
    }

    pub fn precedence(&self) -> u8 {
        self.data.map_or(0, |d| d.precedence)
    }

    pub fn flags(&self) -> SymbolFlags {
        self.data.map_or(SymbolFlags::empty(), |d| d.flags)
    }

    pub fn as_builtin(&self) -> Option<Builtin> {
        match self.kind {
            SymbolKind::Builtin(builtin) => Some(builtin),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<TagKind> {
        match self.kind {
            SymbolKind::Tag(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<BlockKind> {
        match self.kind {
            SymbolKind::Block(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<TokenClass> {
        match self.kind {
            SymbolKind::Token(class) => Some(class),
            _ => None,
        }
    }

    pub fn is_builtin(&self, builtin: Builtin) -> bool {
        self.as_builtin() == Some(builtin)
    }

    /// 是否是需要操作数的运算符（内建运算符、关键字或宏）。
    pub fn is_operator(&self) -> bool {
        matches!(self.kind, SymbolKind::Builtin(_) | SymbolKind::Macro(_))
    }

    pub fn is_macro(&self) -> bool {
        matches!(self.kind, SymbolKind::Macro(_)) || self.flags().contains(SymbolFlags::MACRO)
    }
}
