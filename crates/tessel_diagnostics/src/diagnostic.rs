//! Structured diagnostic messages.

use crate::code::DiagnosticCode;
use crate::label::Label;
use crate::severity::Severity;
use serde::Serialize;
use tessel_source::SrcLoc;

/// A structured diagnostic message.
///
/// Each diagnostic carries:
/// - a severity level and a stable code
/// - the main message and the location of the offending declaration
/// - secondary labels pointing at related declarations, plus notes and help
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// Where the offending entity was declared.
    pub primary_loc: SrcLoc,
    /// Related declarations.
    pub labels: Vec<Label>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
    /// Actionable suggestions.
    pub help: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, loc: SrcLoc) -> Self {
        Self::new(Severity::Error, code, message, loc)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, loc: SrcLoc) -> Self {
        Self::new(Severity::Warning, code, message, loc)
    }

    fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>, loc: SrcLoc) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            primary_loc: loc,
            labels: Vec::new(),
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Adds a label to this diagnostic.
    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn create_error() {
        let code = DiagnosticCode::new(Category::Error, 310);
        let diag = Diagnostic::error(code, "priority cycle", SrcLoc::DUMMY);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "priority cycle");
        assert_eq!(format!("{}", diag.code), "E310");
    }

    #[test]
    fn create_warning() {
        let code = DiagnosticCode::new(Category::Warning, 302);
        let diag = Diagnostic::warning(code, "method `m` is never called", SrcLoc::DUMMY);
        assert_eq!(diag.severity, Severity::Warning);
    }

    #[test]
    fn builder_methods() {
        let code = DiagnosticCode::new(Category::Error, 303);
        let diag = Diagnostic::error(code, "duplicate call", SrcLoc::new("a.rs", 3, 1))
            .with_label(Label::secondary(SrcLoc::new("a.rs", 2, 1), "first call here"))
            .with_note("both calls can execute in the same cycle")
            .with_help("move one call into an exclusive branch");
        assert_eq!(diag.labels.len(), 1);
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
        assert_eq!(diag.primary_loc.line, 3);
    }
}
