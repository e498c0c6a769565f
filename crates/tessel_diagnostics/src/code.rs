//! Diagnostic codes with category prefixes.

use serde::Serialize;
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum Category {
    /// Error diagnostics, prefixed with `E`.
    Error,
    /// Warning diagnostics, prefixed with `W`.
    Warning,
    /// Informational notes, prefixed with `N`.
    Note,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Note => 'N',
        }
    }
}

/// A category prefix plus a number, displayed as e.g. `E301` or `W302`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Error.prefix(), 'E');
        assert_eq!(Category::Warning.prefix(), 'W');
        assert_eq!(Category::Note.prefix(), 'N');
    }

    #[test]
    fn display_pads_to_three_digits() {
        assert_eq!(format!("{}", DiagnosticCode::new(Category::Error, 301)), "E301");
        assert_eq!(format!("{}", DiagnosticCode::new(Category::Warning, 7)), "W007");
    }

    #[test]
    fn const_construction() {
        const CODE: DiagnosticCode = DiagnosticCode::new(Category::Note, 1);
        assert_eq!(CODE.number, 1);
    }

    #[test]
    fn serializes_category_by_name() {
        let json = serde_json::to_string(&DiagnosticCode::new(Category::Error, 310)).unwrap();
        assert_eq!(json, r#"{"category":"Error","number":310}"#);
    }
}
