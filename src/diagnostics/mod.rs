pub mod codes;

use crate::utils::{Loc, SourceTable};
use ariadne::{Color, Label as AriadneLabel, Report, ReportKind, Source};
use codes::ErrorCode;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub loc: Loc,
    /// 标签覆盖的字符数，至少为 1
    pub width: u32,
    pub message: String,
}

impl Label {
    pub fn new(loc: Loc, message: impl Into<String>) -> Self {
        Self {
            loc,
            width: 1,
            message: message.into(),
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width.max(1);
        self
    }
}

/// 一条诊断。第一个标签是主位置；`origin` 记录宏展开之前的位置。
#[derive(Debug, Clone)]
pub struct Diagnostic {
    code: &'static str,
    level: DiagnosticLevel,
    message: String,
    labels: Vec<Label>,
    notes: Vec<String>,
    origin: Option<Loc>,
}

impl Diagnostic {
    pub fn new(error_code: &'static ErrorCode, primary_label: Label) -> Self {
        Self {
            code: error_code.code,
            level: error_code.level,
            message: error_code.message.to_string(),
            labels: vec![primary_label],
            notes: Vec::new(),
            origin: None,
        }
    }

    pub fn error(error_code: &'static ErrorCode, primary_label: Label) -> Self {
        assert!(
            matches!(error_code.level, DiagnosticLevel::Error),
            "Tried to create an error diagnostic with a non-error code."
        );
        Self::new(error_code, primary_label)
    }

    pub fn warning(error_code: &'static ErrorCode, primary_label: Label) -> Self {
        assert!(
            matches!(error_code.level, DiagnosticLevel::Warning),
            "Tried to create a warning diagnostic with a non-warning code."
        );
        Self::new(error_code, primary_label)
    }

    /// 用带有具体信息的消息覆盖 ErrorCode 中的默认消息。
    pub fn with_dynamic_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_secondary_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// 标记这条诊断来自宏展开后的代码。
    pub fn with_origin(mut self, origin: Option<Loc>) -> Self {
        self.origin = origin;
        self
    }

    pub fn code(&self) -> &str {
        self.code
    }

    pub fn level(&self) -> DiagnosticLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn loc(&self) -> Loc {
        self.labels[0].loc
    }

    pub fn line(&self) -> u32 {
        self.loc().line()
    }

    pub fn column(&self) -> u32 {
        self.loc().column()
    }

    pub fn origin(&self) -> Option<Loc> {
        self.origin
    }

    /// 需要单独标出的展开位置；和主位置重合时不再重复。
    pub fn expanded_from(&self) -> Option<Loc> {
        self.origin.filter(|origin| *origin != self.loc())
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

// --- DiagnosticBag ---

/// 收集一个编译单元所有阶段的诊断。
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        log::debug!("{}: {}", diagnostic.code, diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == DiagnosticLevel::Error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn codes(&self) -> Vec<&str> {
        self.diagnostics.iter().map(|d| d.code).collect()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// 打印所有诊断。有源码文本时用 ariadne 渲染，否则退化为一行一条。
    pub fn print(&self, sources: &SourceTable, source_text: Option<&str>) -> io::Result<()> {
        for diag in &self.diagnostics {
            match source_text {
                Some(text) => print_with_source(diag, sources, text)?,
                None => print_plain(diag, sources),
            }
        }
        Ok(())
    }
}

// --- Printer 打印逻辑 ---

fn print_plain(diag: &Diagnostic, sources: &SourceTable) {
    let level = match diag.level {
        DiagnosticLevel::Error => "error",
        DiagnosticLevel::Warning => "warning",
    };
    eprintln!("{}: {}[{}]: {}", sources.position(diag.loc()), level, diag.code, diag.message);
    for label in diag.labels.iter().skip(1) {
        eprintln!("  {}: note: {}", sources.position(label.loc), label.message);
    }
    if let Some(origin) = diag.expanded_from() {
        eprintln!("  {}: note: expanded from here", sources.position(origin));
    }
    for note in &diag.notes {
        eprintln!("  = {}", note);
    }
}

fn print_with_source(diag: &Diagnostic, sources: &SourceTable, text: &str) -> io::Result<()> {
    let file_name = sources.name(diag.loc().source());
    let cache = (file_name, Source::from(text));

    let kind = match diag.level {
        DiagnosticLevel::Error => ReportKind::Error,
        DiagnosticLevel::Warning => ReportKind::Warning,
    };
    let color = match diag.level {
        DiagnosticLevel::Error => Color::Red,
        DiagnosticLevel::Warning => Color::Yellow,
    };

    let primary = char_range(text, &diag.labels[0]);
    let mut report = Report::build(kind, (file_name, primary))
        .with_message(&diag.message)
        .with_code(diag.code);

    for (i, label_info) in diag.labels.iter().enumerate() {
        let label = AriadneLabel::new((file_name, char_range(text, label_info)))
            .with_message(&label_info.message);
        let final_label = if i == 0 {
            label.with_color(color)
        } else {
            label.with_color(Color::Blue)
        };
        report.add_label(final_label);
    }

    if let Some(origin) = diag.expanded_from() {
        let range = char_range(text, &Label::new(origin, ""));
        report.add_label(
            AriadneLabel::new((file_name, range))
                .with_message("expanded from here")
                .with_color(Color::Cyan),
        );
    }

    for note in &diag.notes {
        report = report.with_note(note);
    }

    report.finish().eprint(cache)
}

/// 把 (行, 列) 转成 ariadne 使用的字符偏移区间。
fn char_range(text: &str, label: &Label) -> std::ops::Range<usize> {
    let line = label.loc.line().max(1) as usize;
    let mut offset = 0usize;
    for (index, content) in text.split('\n').enumerate() {
        if index + 1 == line {
            let column = (label.loc.column() as usize).min(content.chars().count());
            let start = offset + column;
            return start..start + label.width as usize;
        }
        offset += content.chars().count() + 1;
    }
    offset..offset
}

#[cfg(test)]
mod test;
