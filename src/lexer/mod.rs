// 导入logos分词库
use logos::Logos;
use crate::diagnostics::codes::*;
use crate::diagnostics::{Diagnostic, DiagnosticBag, Label};
use crate::utils::{Loc, SourceId};

pub mod token;
pub use token::{LexLine, LexToken, TokenKind};


const TRIPLE_QUOTE: &str = "\"\"\"";

// logos 解析时需要使用的错误类型
#[derive(Debug, Default, Clone, PartialEq)]
pub enum LexingError {
    #[default]
    InvalidToken,
}

/// 一行之内的词素定义。换行与缩进由 [`Lexer`] 处理，不交给 logos。
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(error = LexingError)]
// 跳过行内空白
#[logos(skip r"[ \t\r\f]+")]
// 跳过注释
#[logos(skip r";[^\n]*")]
enum RawToken {
    #[token("do")]
    Do,

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"`[\p{L}_][\p{L}\p{N}_]*", |lex| lex.slice()[1..].to_string())]
    VirtualIdent(String),

    #[regex(r"#[\p{L}_][\p{L}\p{N}_]*", |lex| lex.slice().to_string())]
    HashOperator(String),

    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),

    // 连续的运算符字符作为一个整体，之后再按作用域里已知的运算符拆分
    #[regex(r"[+\-*/%=<>!&|:.@^~?]+", |lex| lex.slice().to_string())]
    Operator(String),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| strip_quotes(lex.slice()))]
    DoubleQuoted(String),

    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| strip_quotes(lex.slice()))]
    SingleQuoted(String),

    #[token("\"\"\"")]
    TripleQuote,

    #[token("(", |_| '(')]
    #[token("[", |_| '[')]
    #[token("{", |_| '{')]
    Open(char),

    #[token(")", |_| ')')]
    #[token("]", |_| ']')]
    #[token("}", |_| '}')]
    Close(char),

    #[token(",")]
    Comma,
}

fn strip_quotes(slice: &str) -> String {
    slice[1..slice.len() - 1].to_string()
}

/// 一段待扫描的文本：一整行去掉缩进后的部分，或者三引号字符串结束之后的剩余部分。
#[derive(Clone, Copy)]
struct Segment<'s> {
    text: &'s str,
    line: u32,
    column: u32,
}

/// 跨行的三引号字符串，扫描到行尾还没有结束。
struct PendingTriple {
    loc: Loc,
    content: String,
    literate: bool,
}

/// 逐行的分词器。产出非空的逻辑行，错误写入 DiagnosticBag。
pub struct Lexer<'a> {
    source: SourceId,
    tab_size: Option<u32>,
    diagnostics: &'a mut DiagnosticBag,
    overflow_reported: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: SourceId, tab_size: Option<u32>, diagnostics: &'a mut DiagnosticBag) -> Self {
        Self {
            source,
            tab_size,
            diagnostics,
            overflow_reported: false,
        }
    }

    pub fn tokenize(&mut self, text: &str) -> Vec<LexLine> {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut out = Vec::new();
        let mut index = 0;

        while index < lines.len() {
            let raw = lines[index];
            let line = index as u32 + 1;
            index += 1;

            let (indent, start) = self.measure_indent(raw, line);
            let mut tokens = Vec::new();
            let mut segment = Segment {
                text: &raw[start..],
                line,
                column: indent,
            };

            while let Some(pending) = self.scan_segment(segment, &mut tokens) {
                let mut content = pending.content;
                let mut closed = None;
                while index < lines.len() {
                    let next = lines[index];
                    let next_line = index as u32 + 1;
                    index += 1;
                    content.push('\n');
                    if let Some(pos) = next.find(TRIPLE_QUOTE) {
                        content.push_str(&next[..pos]);
                        closed = Some((next, next_line, pos + TRIPLE_QUOTE.len()));
                        break;
                    }
                    content.push_str(next);
                }

                let Some((closing, closing_line, after)) = closed else {
                    self.report(Diagnostic::error(
                        &E0001_UNTERMINATED_STRING,
                        Label::new(pending.loc, "this triple-quoted string is never closed").with_width(3),
                    ));
                    break;
                };
                if pending.literate {
                    // 行首的三引号块是说明文字，整体丢弃
                    break;
                }
                tokens.push(LexToken {
                    kind: TokenKind::Str(content),
                    loc: pending.loc,
                    width: 3,
                });
                segment = Segment {
                    text: &closing[after..],
                    line: closing_line,
                    column: closing[..after].chars().count() as u32,
                };
            }

            if !tokens.is_empty() {
                out.push(LexLine { indent, line, tokens });
            }
        }
        out
    }

    /// 返回 (缩进列数, 第一个非空白字符的字节偏移)。
    fn measure_indent(&mut self, raw: &str, line: u32) -> (u32, usize) {
        let mut column = 0u32;
        let mut first_tab = None;
        for (offset, ch) in raw.char_indices() {
            match ch {
                ' ' => column += 1,
                '\t' => match self.tab_size {
                    Some(size) if size > 0 => column = (column / size + 1) * size,
                    _ => {
                        first_tab.get_or_insert(column);
                        column += 1;
                    }
                },
                '\r' => {}
                _ => {
                    if let Some(tab_column) = first_tab {
                        let loc = self.loc(line, tab_column);
                        self.report(Diagnostic::error(
                            &E0005_TAB_INDENTATION,
                            Label::new(loc, "tab used for indentation"),
                        ));
                    }
                    return (column, offset);
                }
            }
        }
        (column, raw.len())
    }

    fn scan_segment(&mut self, segment: Segment<'_>, tokens: &mut Vec<LexToken>) -> Option<PendingTriple> {
        let mut lex = RawToken::lexer(segment.text);
        while let Some(result) = lex.next() {
            let span = lex.span();
            let column = segment.column + segment.text[..span.start].chars().count() as u32;
            let loc = self.loc(segment.line, column);
            let width = lex.slice().chars().count() as u32;

            let kind = match result {
                Ok(RawToken::TripleQuote) => {
                    let literate = column == 0 && tokens.is_empty();
                    let rest = &segment.text[span.end..];
                    match rest.find(TRIPLE_QUOTE) {
                        Some(pos) => {
                            let content = rest[..pos].to_string();
                            lex.bump(pos + TRIPLE_QUOTE.len());
                            if literate {
                                continue;
                            }
                            TokenKind::Str(content)
                        }
                        None => {
                            return Some(PendingTriple {
                                loc,
                                content: rest.to_string(),
                                literate,
                            });
                        }
                    }
                }
                Ok(RawToken::Do) => TokenKind::Do,
                Ok(RawToken::Ident(name)) => TokenKind::Ident(name),
                Ok(RawToken::VirtualIdent(name)) => TokenKind::VirtualIdent(name),
                Ok(RawToken::HashOperator(op)) => TokenKind::HashOperator(op),
                Ok(RawToken::Operator(op)) => TokenKind::Operator(op),
                Ok(RawToken::Number(text)) => match text.parse::<f64>() {
                    Ok(value) => TokenKind::Number(value),
                    Err(_) => {
                        self.report(Diagnostic::error(
                            &E0000_UNRECOGNIZED_CHAR,
                            Label::new(loc, format!("`{text}` is not a valid number")).with_width(width),
                        ));
                        continue;
                    }
                },
                Ok(RawToken::DoubleQuoted(raw)) | Ok(RawToken::SingleQuoted(raw)) => {
                    TokenKind::Str(self.unescape(&raw, loc))
                }
                Ok(RawToken::Open(c)) => TokenKind::Open(c),
                Ok(RawToken::Close(c)) => TokenKind::Close(c),
                Ok(RawToken::Comma) => TokenKind::Comma,
                Err(_) => {
                    let ch = lex.slice().chars().next().unwrap_or_default();
                    if ch == '"' || ch == '\'' {
                        self.report(Diagnostic::error(
                            &E0001_UNTERMINATED_STRING,
                            Label::new(loc, "string is not closed before the end of the line"),
                        ));
                        // 字符串吞掉了这一行剩下的部分
                        return None;
                    }
                    self.report(
                        Diagnostic::error(&E0000_UNRECOGNIZED_CHAR, Label::new(loc, "unrecognized character"))
                            .with_dynamic_message(format!("Unrecognized character `{ch}`")),
                    );
                    continue;
                }
            };
            tokens.push(LexToken { kind, loc, width });
        }
        None
    }

    /// 处理字符串字面量中的转义。非法转义替换为 U+FFFD 并报告错误。
    fn unescape(&mut self, raw: &str, loc: Loc) -> String {
        let mut s = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '\\' {
                s.push(c);
                continue;
            }
            let decoded = match chars.next() {
                Some('n') => Some('\n'),
                Some('t') => Some('\t'),
                Some('r') => Some('\r'),
                Some('b') => Some('\u{8}'),
                Some('f') => Some('\u{c}'),
                Some('v') => Some('\u{b}'),
                Some('\\') => Some('\\'),
                Some('\'') => Some('\''),
                Some('"') => Some('"'),
                Some('x') => take_hex(&mut chars, 2),
                Some('u') => take_hex(&mut chars, 4),
                Some(d @ '0'..='7') => {
                    let mut value = d.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match chars.peek().and_then(|c| c.to_digit(8)) {
                            Some(digit) => {
                                value = value * 8 + digit;
                                chars.next();
                            }
                            None => break,
                        }
                    }
                    char::from_u32(value)
                }
                _ => None,
            };
            match decoded {
                Some(ch) => s.push(ch),
                None => {
                    self.report(Diagnostic::error(
                        &E0003_MALFORMED_ESCAPE,
                        Label::new(loc, "this string contains an invalid escape sequence"),
                    ));
                    s.push('\u{FFFD}');
                }
            }
        }
        s
    }

    fn loc(&mut self, line: u32, column: u32) -> Loc {
        match Loc::new(self.source, line, column) {
            Ok(loc) => loc,
            Err(error) => {
                let loc = Loc::clamped(self.source, line, column);
                if !self.overflow_reported {
                    self.overflow_reported = true;
                    self.report(
                        Diagnostic::error(&E0007_LOCATION_OUT_OF_RANGE, Label::new(loc, error.to_string()))
                            .with_dynamic_message(format!("Source location out of range: {error}")),
                    );
                }
                loc
            }
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, count: usize) -> Option<char> {
    let mut value = 0u32;
    for _ in 0..count {
        let digit = chars.peek().and_then(|c| c.to_digit(16))?;
        value = value * 16 + digit;
        chars.next();
    }
    char::from_u32(value)
}

/// 对源代码进行分词，返回所有非空逻辑行，并将所有词法错误报告给 DiagnosticBag。
pub fn tokenize(
    text: &str,
    source: SourceId,
    tab_size: Option<u32>,
    diagnostics: &mut DiagnosticBag,
) -> Vec<LexLine> {
    Lexer::new(source, tab_size, diagnostics).tokenize(text)
}
