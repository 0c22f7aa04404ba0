use super::codes::E0200_UNDECLARED_IDENTIFIER;
use super::*;
use crate::utils::SourceId;
use pretty_assertions::assert_eq;

fn at(line: u32, column: u32) -> Loc {
    Loc::clamped(SourceId::default(), line, column)
}

fn undeclared(loc: Loc) -> Diagnostic {
    Diagnostic::error(&E0200_UNDECLARED_IDENTIFIER, Label::new(loc, "not found in this scope"))
}

#[test]
fn test_expansion_site_is_separate_from_primary_location() {
    let diagnostic = undeclared(at(2, 2)).with_origin(Some(at(4, 0)));
    assert_eq!((diagnostic.line(), diagnostic.column()), (2, 2));
    assert_eq!(diagnostic.expanded_from(), Some(at(4, 0)));
}

#[test]
fn test_expansion_site_equal_to_primary_is_not_repeated() {
    let diagnostic = undeclared(at(4, 0)).with_origin(Some(at(4, 0)));
    assert_eq!(diagnostic.origin(), Some(at(4, 0)));
    assert_eq!(diagnostic.expanded_from(), None);
    assert_eq!(undeclared(at(1, 0)).expanded_from(), None);
}

#[test]
fn test_printing_without_source_text() {
    let mut sources = SourceTable::new();
    let source = sources.add_source("main.rill").unwrap();
    let mut bag = DiagnosticBag::new();
    bag.report(undeclared(Loc::clamped(source, 2, 2)).with_origin(Some(Loc::clamped(source, 4, 0))));
    assert!(bag.has_errors());
    assert!(bag.print(&sources, None).is_ok());
}
