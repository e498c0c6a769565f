//! Caller locations captured at declaration time.

use serde::Serialize;
use std::fmt;
use std::panic::Location;

/// The file, line and column of a declaration in user code.
///
/// `file` is `'static` because it comes from [`Location::caller`]; this keeps
/// `SrcLoc` `Copy` and cheap to store on every call site.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct SrcLoc {
    /// Path of the source file, as reported by the compiler.
    pub file: &'static str,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl SrcLoc {
    /// A placeholder for entities created by the elaborator itself.
    pub const DUMMY: SrcLoc = SrcLoc {
        file: "<generated>",
        line: 0,
        column: 0,
    };

    /// Creates a location from its parts.
    pub const fn new(file: &'static str, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// Returns the location of the caller of the enclosing
    /// `#[track_caller]` function.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }

    /// Returns `true` if this is the placeholder location.
    pub fn is_dummy(&self) -> bool {
        self.line == 0
    }
}

impl From<&'static Location<'static>> for SrcLoc {
    fn from(loc: &'static Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

impl fmt::Display for SrcLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
