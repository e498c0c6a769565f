//! Structured diagnostics for transaction-graph elaboration.
//!
//! Elaboration problems are reported as [`Diagnostic`] values with a severity,
//! a stable [`DiagnosticCode`], the source location of the offending
//! declaration and optional secondary labels. A [`DiagnosticSink`] collects
//! them; [`TerminalRenderer`] and [`JsonRenderer`] turn them into text.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod label;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use label::{Label, LabelStyle};
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
