//! 源码位置模型。
//!
//! 一个位置被压缩进一个 `u32`：高 6 位是源文件序号，中间 16 位是行号，
//! 低 10 位是列号。这样两个位置可以直接按整数比较先后。
//! 任何字段越界都会返回 [`LocError`]，而不是悄悄截断。

use std::fmt;
use thiserror::Error;

pub const SOURCE_BITS: u32 = 6;
pub const LINE_BITS: u32 = 16;
pub const COLUMN_BITS: u32 = 10;

pub const MAX_SOURCES: usize = 1 << SOURCE_BITS;
pub const MAX_LINE: u32 = (1 << LINE_BITS) - 1;
pub const MAX_COLUMN: u32 = (1 << COLUMN_BITS) - 1;

/// 位置编码失败的原因。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocError {
    #[error("too many source files: at most {MAX_SOURCES} can be registered")]
    TooManySources,
    #[error("line {0} exceeds the maximum encodable line {MAX_LINE}")]
    LineOverflow(u32),
    #[error("column {0} exceeds the maximum encodable column {MAX_COLUMN}")]
    ColumnOverflow(u32),
}

/// 源文件在 [`SourceTable`] 中的序号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceId(u8);

impl SourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 压缩后的源码位置。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Loc(u32);

impl Loc {
    /// 组合出一个位置；任何字段超出位宽都会报错。
    pub fn new(source: SourceId, line: u32, column: u32) -> Result<Self, LocError> {
        if line > MAX_LINE {
            return Err(LocError::LineOverflow(line));
        }
        if column > MAX_COLUMN {
            return Err(LocError::ColumnOverflow(column));
        }
        Ok(Self::pack(source, line, column))
    }

    /// 把越界的字段钳到最大值。只在已经报告过越界错误之后使用，
    /// 让扫描可以继续下去。
    pub fn clamped(source: SourceId, line: u32, column: u32) -> Self {
        Self::pack(source, line.min(MAX_LINE), column.min(MAX_COLUMN))
    }

    fn pack(source: SourceId, line: u32, column: u32) -> Self {
        Loc(((source.0 as u32) << (LINE_BITS + COLUMN_BITS)) | (line << COLUMN_BITS) | column)
    }

    pub fn source(self) -> SourceId {
        SourceId((self.0 >> (LINE_BITS + COLUMN_BITS)) as u8)
    }

    pub fn line(self) -> u32 {
        (self.0 >> COLUMN_BITS) & MAX_LINE
    }

    pub fn column(self) -> u32 {
        self.0 & MAX_COLUMN
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(raw: u32) -> Self {
        Loc(raw)
    }
}

impl fmt::Debug for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loc({}:{}:{})", self.source().0, self.line(), self.column())
    }
}

/// `make_loc` 的函数形式，和 [`Loc::new`] 等价。
pub fn make_loc(source: SourceId, line: u32, column: u32) -> Result<Loc, LocError> {
    Loc::new(source, line, column)
}

/// 一个位置范围，`end` 指向最后一个字符之后。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LocRange {
    pub start: Loc,
    pub end: Loc,
}

impl LocRange {
    pub fn new(start: Loc, end: Loc) -> Self {
        Self { start, end }
    }

    pub fn point(loc: Loc) -> Self {
        Self { start: loc, end: loc }
    }
}

/// 解码后的结构化位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position<'a> {
    pub source: &'a str,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 列号内部从 0 开始，显示时从 1 开始
        write!(f, "{}:{}:{}", self.source, self.line, self.column + 1)
    }
}

/// 源文件名表。同一个名字总是得到同一个序号。
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    names: Vec<String>,
}

impl SourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, name: &str) -> Result<SourceId, LocError> {
        if let Some(index) = self.names.iter().position(|n| n == name) {
            return Ok(SourceId(index as u8));
        }
        if self.names.len() >= MAX_SOURCES {
            return Err(LocError::TooManySources);
        }
        self.names.push(name.to_string());
        Ok(SourceId((self.names.len() - 1) as u8))
    }

    pub fn name(&self, id: SourceId) -> &str {
        self.names.get(id.index()).map(String::as_str).unwrap_or("<unknown>")
    }

    pub fn position(&self, loc: Loc) -> Position<'_> {
        Position {
            source: self.name(loc.source()),
            line: loc.line(),
            column: loc.column(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pack_and_unpack() {
        let mut table = SourceTable::new();
        let src = table.add_source("main.rill").unwrap();
        let loc = make_loc(src, 12, 7).unwrap();
        assert_eq!(loc.source(), src);
        assert_eq!(loc.line(), 12);
        assert_eq!(loc.column(), 7);
        assert_eq!(table.position(loc).to_string(), "main.rill:12:8");
    }

    #[test]
    fn test_interning_is_idempotent() {
        let mut table = SourceTable::new();
        let a = table.add_source("a").unwrap();
        let b = table.add_source("b").unwrap();
        assert_ne!(a, b);
        assert_eq!(table.add_source("a").unwrap(), a);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_ordering_follows_source_line_column() {
        let mut table = SourceTable::new();
        let a = table.add_source("a").unwrap();
        let b = table.add_source("b").unwrap();
        assert!(make_loc(a, 1, 900).unwrap() < make_loc(a, 2, 0).unwrap());
        assert!(make_loc(a, 65535, 0).unwrap() < make_loc(b, 1, 0).unwrap());
    }

    #[test]
    fn test_overflow_fails_loudly() {
        let mut table = SourceTable::new();
        let src = table.add_source("x").unwrap();
        assert_eq!(make_loc(src, 70_000, 0), Err(LocError::LineOverflow(70_000)));
        assert_eq!(make_loc(src, 1, 1024), Err(LocError::ColumnOverflow(1024)));
        for i in 1..MAX_SOURCES {
            table.add_source(&format!("f{i}")).unwrap();
        }
        assert_eq!(table.add_source("one-too-many"), Err(LocError::TooManySources));
        // 钳位版本不会越界
        let clamped = Loc::clamped(src, 70_000, 5000);
        assert_eq!(clamped.line(), MAX_LINE);
        assert_eq!(clamped.column(), MAX_COLUMN);
    }
}
