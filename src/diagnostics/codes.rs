// src/diagnostics/codes.rs

use crate::diagnostics::DiagnosticLevel;

/// Represents a specific error code with its associated information.
/// This struct serves as the single source of truth for all compiler diagnostics.
#[derive(Debug, Clone)]
pub struct ErrorCode {
    pub code: &'static str,
    pub level: DiagnosticLevel,
    pub message: &'static str,
    pub explanation: &'static str,
}

/*
E00xx: 词法分析 (Lexical Analysis) 错误。

E01xx: 块结构与组合 (Block structure / Combination) 错误。

E02xx: 语义分析 (Resolution / Arity) 错误。

E03xx: 宏展开 (Macro Expansion) 错误。

E04xx: 代码生成与内部错误。
*/

// --- E00xx: Lexical Analysis Errors ---

pub const E0000_UNRECOGNIZED_CHAR: ErrorCode = ErrorCode {
    code: "E0000",
    level: DiagnosticLevel::Error,
    message: "Unrecognized character",
    explanation: "The tokenizer met a character that cannot start any token. \
                  Scanning resumes right after it.",
};

pub const E0001_UNTERMINATED_STRING: ErrorCode = ErrorCode {
    code: "E0001",
    level: DiagnosticLevel::Error,
    message: "Unterminated string literal",
    explanation: "A quoted string reached the end of its line (or, for triple-quoted strings, \
                  the end of the input) without a closing quote.",
};

pub const E0003_MALFORMED_ESCAPE: ErrorCode = ErrorCode {
    code: "E0003",
    level: DiagnosticLevel::Error,
    message: "Malformed escape sequence",
    explanation: "Supported escapes are \\n \\t \\r \\b \\f \\v \\0 \\\\ \\' \\\", \\xNN, \\uNNNN \
                  and octal \\NNN. The bad escape is replaced by U+FFFD.",
};

pub const E0005_TAB_INDENTATION: ErrorCode = ErrorCode {
    code: "E0005",
    level: DiagnosticLevel::Error,
    message: "Tab character in indentation",
    explanation: "Indentation is measured in columns. Tabs are only accepted when a tab size \
                  is configured.",
};

pub const E0007_LOCATION_OUT_OF_RANGE: ErrorCode = ErrorCode {
    code: "E0007",
    level: DiagnosticLevel::Error,
    message: "Source location out of range",
    explanation: "Locations are packed into 32 bits: at most 64 sources, 65535 lines and \
                  1023 columns can be addressed.",
};

// --- E01xx: Block structure / Combination Errors ---

pub const E0101_MISPLACED_CLOSE: ErrorCode = ErrorCode {
    code: "E0101",
    level: DiagnosticLevel::Error,
    message: "Misplaced closing bracket",
    explanation: "A closing bracket appeared where no bracket is open. It is ignored.",
};

pub const E0102_CLOSING_ROOT_BLOCK: ErrorCode = ErrorCode {
    code: "E0102",
    level: DiagnosticLevel::Error,
    message: "Attempt to close the root block",
    explanation: "A closing bracket escaped every open block. The root block can only be \
                  closed by the end of the input.",
};

pub const E0103_MISMATCHED_CLOSE: ErrorCode = ErrorCode {
    code: "E0103",
    level: DiagnosticLevel::Error,
    message: "Mismatched closing bracket",
    explanation: "The closing bracket does not match the innermost open bracket. The open \
                  bracket is closed anyway.",
};

pub const E0104_INCONSISTENT_DEDENT: ErrorCode = ErrorCode {
    code: "E0104",
    level: DiagnosticLevel::Error,
    message: "Unindent does not match any outer indentation level",
    explanation: "After an unindent the line must start at the column of an enclosing block.",
};

pub const E0105_UNCLOSED_BLOCK: ErrorCode = ErrorCode {
    code: "E0105",
    level: DiagnosticLevel::Error,
    message: "Unclosed bracket",
    explanation: "The input ended while a bracket was still open.",
};

pub const E0106_UNKNOWN_OPERATOR: ErrorCode = ErrorCode {
    code: "E0106",
    level: DiagnosticLevel::Error,
    message: "Unknown operator",
    explanation: "The operator is not defined in the current scope and cannot be split into \
                  known operators.",
};

pub const E0107_UNEXPECTED_TOKEN: ErrorCode = ErrorCode {
    code: "E0107",
    level: DiagnosticLevel::Error,
    message: "Unexpected token",
    explanation: "The token cannot be combined with the expression before it.",
};

pub const E0108_UNATTACHED_CLAUSE: ErrorCode = ErrorCode {
    code: "E0108",
    level: DiagnosticLevel::Error,
    message: "Dependent clause has nothing to attach to",
    explanation: "Clauses such as `else`, `catch` and `finally` must follow the construct \
                  that accepts them, and each may appear at most once.",
};

pub const E0109_MALFORMED_CLAUSE: ErrorCode = ErrorCode {
    code: "E0109",
    level: DiagnosticLevel::Error,
    message: "Malformed clause",
    explanation: "An `else` must be followed by an `if` or a block, a `catch` needs a name and \
                  a body, and a `try` needs a `catch` or a `finally`.",
};

pub const E0110_MALFORMED_LITERAL: ErrorCode = ErrorCode {
    code: "E0110",
    level: DiagnosticLevel::Error,
    message: "Malformed object literal",
    explanation: "Every entry of an object literal must be a `key: value` pair whose key is a \
                  name or a string.",
};

// --- E02xx: Semantic Analysis Errors ---

pub const E0200_UNDECLARED_IDENTIFIER: ErrorCode = ErrorCode {
    code: "E0200",
    level: DiagnosticLevel::Error,
    message: "Undeclared identifier",
    explanation: "The name was not declared in this scope or any enclosing scope. Declare it \
                  with `var` or `const`, or mark it `#external`.",
};

pub const E0201_REDECLARED_IDENTIFIER: ErrorCode = ErrorCode {
    code: "E0201",
    level: DiagnosticLevel::Error,
    message: "Redeclared identifier",
    explanation: "A name can be declared only once per scope.",
};

pub const E0202_ASSIGNMENT_TO_CONSTANT: ErrorCode = ErrorCode {
    code: "E0202",
    level: DiagnosticLevel::Error,
    message: "Assignment to a constant",
    explanation: "The name was declared with `const` and cannot be assigned after its \
                  declaration.",
};

pub const E0203_INVALID_ASSIGNMENT_TARGET: ErrorCode = ErrorCode {
    code: "E0203",
    level: DiagnosticLevel::Error,
    message: "Invalid assignment target",
    explanation: "Only names, member accesses, element accesses and tuples of those can be \
                  assigned.",
};

pub const E0204_JUMP_OUTSIDE_TARGET: ErrorCode = ErrorCode {
    code: "E0204",
    level: DiagnosticLevel::Error,
    message: "Jump statement outside of its target",
    explanation: "`give` and `end` must be inside a `do` block or a `loop`; `next` must be \
                  inside a `loop`.",
};

pub const E0205_RETURN_OUTSIDE_FUNCTION: ErrorCode = ErrorCode {
    code: "E0205",
    level: DiagnosticLevel::Error,
    message: "`return` outside of a function",
    explanation: "`return` is only meaningful inside an `fn` body.",
};

pub const E0206_VOID_USED_AS_VALUE: ErrorCode = ErrorCode {
    code: "E0206",
    level: DiagnosticLevel::Error,
    message: "Void used as value",
    explanation: "The expression produces no value but its context requires one.",
};

pub const E0207_WRONG_TUPLE_ARITY: ErrorCode = ErrorCode {
    code: "E0207",
    level: DiagnosticLevel::Error,
    message: "Wrong tuple arity",
    explanation: "The number of values produced does not match the number of values expected.",
};

pub const E0208_OPERAND_COUNT: ErrorCode = ErrorCode {
    code: "E0208",
    level: DiagnosticLevel::Error,
    message: "Wrong number of operands",
    explanation: "The operator or keyword received fewer or more operands than it accepts.",
};

pub const E0209_INVALID_DECLARATION: ErrorCode = ErrorCode {
    code: "E0209",
    level: DiagnosticLevel::Error,
    message: "Invalid declaration",
    explanation: "Only names, or tuples of names, can be declared.",
};

// --- E03xx: Macro Expansion Errors ---

pub const E0300_MACRO_FAILED: ErrorCode = ErrorCode {
    code: "E0300",
    level: DiagnosticLevel::Error,
    message: "Macro expansion failed",
    explanation: "The macro's expansion routine reported an error. Expansion of this node \
                  stopped; the rest of the unit is still expanded.",
};

pub const E0301_MACRO_PANICKED: ErrorCode = ErrorCode {
    code: "E0301",
    level: DiagnosticLevel::Error,
    message: "Macro expansion routine crashed",
    explanation: "A native expansion routine panicked. The panic was contained and reported.",
};

pub const E0302_MALFORMED_MACRO_DEFINITION: ErrorCode = ErrorCode {
    code: "E0302",
    level: DiagnosticLevel::Error,
    message: "Malformed macro definition",
    explanation: "Use `#macro NAME PARAMS TEMPLATE`, where PARAMS is a name or a \
                  parenthesised list of names.",
};

pub const E0303_UNDECLARED_VIRTUAL_IDENTIFIER: ErrorCode = ErrorCode {
    code: "E0303",
    level: DiagnosticLevel::Error,
    message: "Undeclared virtual identifier",
    explanation: "A backtick name inside a macro template is used before the template \
                  declares it.",
};

pub const E0304_MISPLACED_QUOTE: ErrorCode = ErrorCode {
    code: "E0304",
    level: DiagnosticLevel::Error,
    message: "Misplaced quotation",
    explanation: "`#quote` is only valid as a macro template and `#unquote` only inside one.",
};

pub const E0305_EXPANSION_LIMIT: ErrorCode = ErrorCode {
    code: "E0305",
    level: DiagnosticLevel::Error,
    message: "Macro expansion limit reached",
    explanation: "A node kept expanding into another macro invocation. This usually means a \
                  macro expands into itself.",
};

pub const E0306_MACRO_ARGUMENT_COUNT: ErrorCode = ErrorCode {
    code: "E0306",
    level: DiagnosticLevel::Error,
    message: "Wrong number of macro arguments",
    explanation: "The invocation passes a different number of arguments than the macro \
                  declares parameters.",
};

// --- E04xx: Code Generation / Internal Errors ---

pub const E0400_INTERNAL_COMPILER_ERROR: ErrorCode = ErrorCode {
    code: "E0400",
    level: DiagnosticLevel::Error,
    message: "Internal compiler error",
    explanation: "The compiler reached a state it considers impossible. Please report it.",
};
