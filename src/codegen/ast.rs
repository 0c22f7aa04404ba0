//! src/codegen/ast.rs
//!
//! 代码生成的输出：一棵通用的"语句/表达式"树，交给外部的打印器渲染成目标语言。
//!
//! 从源码节点生成的语句和表达式包在 `Located` 里，打印器据此建立
//! 输出位置到源码位置（以及宏调用点）的映射表。

use crate::utils::Loc;

/// 输出节点对应的源码位置。`origin` 是宏展开之前的调用点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub loc: Loc,
    pub origin: Option<Loc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
}

impl Program {
    /// 去掉所有位置信息，只留下结构。
    pub fn without_locations(self) -> Program {
        Program {
            body: strip_all(self.body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    /// 一个块顶部合成的声明，例如 `let a, b, $t1;`
    VarDecl(Vec<String>),
    Block(Vec<Stmt>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
    },
    Located(SourceSpan, Box<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
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
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "===",
            BinaryOp::NotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    Function {
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        computed: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Located(SourceSpan, Box<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn number(value: f64) -> Self {
        Expr::Literal(Literal::Number(value))
    }

    pub fn undefined() -> Self {
        Expr::Literal(Literal::Undefined)
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, argument: Expr) -> Self {
        Expr::Unary {
            op,
            argument: Box::new(argument),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    /// 求值没有副作用、也不会被之后的语句改变的表达式，不必先存进临时变量。
    pub fn is_trivial(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::Function { .. } => true,
            Expr::Located(_, inner) => inner.is_trivial(),
            _ => false,
        }
    }

    /// 标上源码位置；已经有位置的表达式保持不变。
    pub fn located(self, span: SourceSpan) -> Self {
        match self {
            Expr::Located(..) => self,
            expr => Expr::Located(span, Box::new(expr)),
        }
    }

    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            Expr::Located(span, _) => Some(*span),
            _ => None,
        }
    }

    pub fn without_locations(self) -> Expr {
        let strip = |expr: Box<Expr>| Box::new((*expr).without_locations());
        match self {
            Expr::Located(_, inner) => (*inner).without_locations(),
            Expr::Function { params, body } => Expr::Function {
                params,
                body: strip_all(body),
            },
            Expr::Member {
                object,
                property,
                computed,
            } => Expr::Member {
                object: strip(object),
                property: strip(property),
                computed,
            },
            Expr::Call { callee, args } => Expr::Call {
                callee: strip(callee),
                args: args.into_iter().map(Expr::without_locations).collect(),
            },
            Expr::New { callee, args } => Expr::New {
                callee: strip(callee),
                args: args.into_iter().map(Expr::without_locations).collect(),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op,
                left: strip(left),
                right: strip(right),
            },
            Expr::Logical { op, left, right } => Expr::Logical {
                op,
                left: strip(left),
                right: strip(right),
            },
            Expr::Unary { op, argument } => Expr::Unary {
                op,
                argument: strip(argument),
            },
            Expr::Assign { target, value } => Expr::Assign {
                target: strip(target),
                value: strip(value),
            },
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => Expr::Conditional {
                test: strip(test),
                consequent: strip(consequent),
                alternate: strip(alternate),
            },
            Expr::Array(items) => Expr::Array(items.into_iter().map(Expr::without_locations).collect()),
            Expr::Object(entries) => Expr::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.without_locations()))
                    .collect(),
            ),
            expr @ (Expr::Literal(_) | Expr::Ident(_)) => expr,
        }
    }
}

impl Stmt {
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }

    /// `name = value;`
    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Expr(Expr::assign(Expr::ident(name), value))
    }

    /// 控制流不会越过这条语句继续往下走。
    pub fn is_terminal(&self) -> bool {
        match self {
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Return(_) | Stmt::Throw(_) => true,
            Stmt::Located(_, inner) => inner.is_terminal(),
            _ => false,
        }
    }

    pub fn located(self, span: SourceSpan) -> Self {
        match self {
            Stmt::Located(..) => self,
            stmt => Stmt::Located(span, Box::new(stmt)),
        }
    }

    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            Stmt::Located(span, _) => Some(*span),
            _ => None,
        }
    }

    pub fn without_locations(self) -> Stmt {
        let strip = |stmt: Box<Stmt>| Box::new((*stmt).without_locations());
        match self {
            Stmt::Located(_, inner) => (*inner).without_locations(),
            Stmt::Expr(expr) => Stmt::Expr(expr.without_locations()),
            Stmt::Block(body) => Stmt::Block(strip_all(body)),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => Stmt::If {
                test: test.without_locations(),
                consequent: strip(consequent),
                alternate: alternate.map(strip),
            },
            Stmt::While { test, body } => Stmt::While {
                test: test.without_locations(),
                body: strip(body),
            },
            Stmt::Labeled { label, body } => Stmt::Labeled {
                label,
                body: strip(body),
            },
            Stmt::Return(value) => Stmt::Return(value.map(Expr::without_locations)),
            Stmt::Throw(value) => Stmt::Throw(value.without_locations()),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => Stmt::Try {
                block: strip_all(block),
                handler: handler.map(|clause| CatchClause {
                    param: clause.param,
                    body: strip_all(clause.body),
                }),
                finalizer: finalizer.map(strip_all),
            },
            stmt @ (Stmt::VarDecl(_) | Stmt::Break(_) | Stmt::Continue(_)) => stmt,
        }
    }
}

fn strip_all(stmts: Vec<Stmt>) -> Vec<Stmt> {
    stmts.into_iter().map(Stmt::without_locations).collect()
}
