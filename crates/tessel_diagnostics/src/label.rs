//! Labels pointing at declarations related to a diagnostic.

use serde::Serialize;
use tessel_source::SrcLoc;

/// The role of a diagnostic label.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum LabelStyle {
    /// The main offending declaration.
    Primary,
    /// A related declaration providing context.
    Secondary,
}

/// A source location with an explanatory message.
#[derive(Clone, Debug, Serialize)]
pub struct Label {
    /// The location this label points at.
    pub loc: SrcLoc,
    /// The message displayed next to the location.
    pub message: String,
    /// Whether this is a primary or secondary label.
    pub style: LabelStyle,
}

impl Label {
    /// Creates a primary label.
    pub fn primary(loc: SrcLoc, message: impl Into<String>) -> Self {
        Self {
            loc,
            message: message.into(),
            style: LabelStyle::Primary,
        }
    }

    /// Creates a secondary label.
    pub fn secondary(loc: SrcLoc, message: impl Into<String>) -> Self {
        Self {
            loc,
            message: message.into(),
            style: LabelStyle::Secondary,
        }
    }
}
