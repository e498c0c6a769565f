//! Diagnostic rendering for terminals and tools.

use crate::diagnostic::Diagnostic;
use crate::label::LabelStyle;

/// Formats a diagnostic into a string.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic.
    fn render(&self, diag: &Diagnostic) -> String;

    /// Renders a list of diagnostics, one after another.
    fn render_all(&self, diags: &[Diagnostic]) -> String {
        diags.iter().map(|d| self.render(d)).collect()
    }
}

/// Renders diagnostics in a rustc-like format:
///
/// ```text
/// error[E310]: priority cycle between `fetch` and `decode`
///   --> src/core.rs:40:9
///    - src/core.rs:52:9: `decode` declared here
///    = note: ...
///    = help: ...
/// ```
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    /// Whether to wrap the header in ANSI color codes.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, diag: &Diagnostic) -> String {
        let text = format!("{}[{}]: {}", diag.severity, diag.code, diag.message);
        if !self.color {
            return text;
        }
        let color = if diag.severity.is_error() { "31" } else { "33" };
        format!("\x1b[1;{color}m{text}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = self.header(diag);
        out.push('\n');

        if !diag.primary_loc.is_dummy() {
            out.push_str(&format!("  --> {}\n", diag.primary_loc));
        }

        for label in &diag.labels {
            let marker = match label.style {
                LabelStyle::Primary => '^',
                LabelStyle::Secondary => '-',
            };
            out.push_str(&format!("   {marker} {}: {}\n", label.loc, label.message));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}

/// Renders each diagnostic as one line of JSON.
#[derive(Debug, Default)]
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        match serde_json::to_string(diag) {
            Ok(mut line) => {
                line.push('\n');
                line
            }
            Err(e) => format!("{{\"error\":\"unserializable diagnostic: {e}\"}}\n"),
        }
    }
}
