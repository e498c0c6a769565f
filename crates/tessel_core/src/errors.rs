//! Diagnostic codes and the elaboration error type.
//!
//! Error codes `E301`--`E309` cover declaration and usage errors raised while
//! bodies are recorded, `E310`--`E312` structural problems of the call graph,
//! `E320`--`E322` unsatisfiable scheduling constraints and `E330`--`E331`
//! problems found while emitting logic. Warning codes `W301`--`W302` cover
//! non-fatal issues.

use tessel_common::InternalError;
use tessel_diagnostics::{Category, Diagnostic, DiagnosticCode, Label};
use tessel_source::SrcLoc;

/// A method or transaction body was opened twice.
pub const E301: DiagnosticCode = DiagnosticCode::new(Category::Error, 301);

/// A method was called before its body was defined.
pub const E302: DiagnosticCode = DiagnosticCode::new(Category::Error, 302);

/// A method was called outside any transaction or method body.
pub const E303: DiagnosticCode = DiagnosticCode::new(Category::Error, 303);

/// A caller calls the same method on two paths that may both be active.
pub const E304: DiagnosticCode = DiagnosticCode::new(Category::Error, 304);

/// A body was opened inside another body.
pub const E305: DiagnosticCode = DiagnosticCode::new(Category::Error, 305);

/// An argument or result does not fit the method layout.
pub const E306: DiagnosticCode = DiagnosticCode::new(Category::Error, 306);

/// Misuse of the recording API.
pub const E307: DiagnosticCode = DiagnosticCode::new(Category::Error, 307);

/// A declared method never received a body.
pub const E308: DiagnosticCode = DiagnosticCode::new(Category::Error, 308);

/// A signal or layout is wider than 64 bits.
pub const E309: DiagnosticCode = DiagnosticCode::new(Category::Error, 309);

/// A method is reachable from itself.
pub const E310: DiagnosticCode = DiagnosticCode::new(Category::Error, 310);

/// A `single_caller` method has more than one caller.
pub const E311: DiagnosticCode = DiagnosticCode::new(Category::Error, 311);

/// A nonexclusive method with arguments has no combiner.
pub const E312: DiagnosticCode = DiagnosticCode::new(Category::Error, 312);

/// Priority relations form a cycle.
pub const E320: DiagnosticCode = DiagnosticCode::new(Category::Error, 320);

/// Simultaneity constraints cannot be met.
pub const E321: DiagnosticCode = DiagnosticCode::new(Category::Error, 321);

/// Two transactions are required to be both simultaneous and independent.
pub const E322: DiagnosticCode = DiagnosticCode::new(Category::Error, 322);

/// The emitted logic contains a combinational cycle.
pub const E330: DiagnosticCode = DiagnosticCode::new(Category::Error, 330);

/// `schedule_before` contradicts definition order.
pub const E331: DiagnosticCode = DiagnosticCode::new(Category::Error, 331);

/// Internal elaborator error.
pub const E399: DiagnosticCode = DiagnosticCode::new(Category::Error, 399);

/// `schedule_before` contradicts definition order (honoured anyway).
pub const W301: DiagnosticCode = DiagnosticCode::new(Category::Warning, 301);

/// A method is defined but never called.
pub const W302: DiagnosticCode = DiagnosticCode::new(Category::Warning, 302);

/// Errors raised while recording or elaborating a transaction graph.
///
/// Every variant carries the location of at least one offending entity.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ElabError {
    /// A body was opened for an entity that already has one.
    #[error("`{name}` is defined twice")]
    Redefinition {
        /// The redefined entity.
        name: String,
        /// The second definition.
        loc: SrcLoc,
        /// The first definition.
        prev_loc: SrcLoc,
    },

    /// A method without a body was called.
    #[error("method `{name}` is called before it is defined")]
    CallUndefined {
        /// The called method.
        name: String,
        /// The call.
        loc: SrcLoc,
    },

    /// A method was called outside any body.
    #[error("method `{name}` is called outside a transaction or method body")]
    NoCurrentBody {
        /// The called method.
        name: String,
        /// The call.
        loc: SrcLoc,
    },

    /// Two call sites from one caller are not mutually exclusive.
    #[error("`{caller}` calls method `{method}` more than once per cycle")]
    DuplicateCall {
        /// The caller.
        caller: String,
        /// The called method.
        method: String,
        /// The later call.
        loc: SrcLoc,
        /// The earlier call.
        prev_loc: SrcLoc,
    },

    /// A body was opened while another one was being recorded.
    #[error("body of `{name}` is opened inside the body of `{outer}`")]
    NestedBody {
        /// The inner entity.
        name: String,
        /// The entity whose body is open.
        outer: String,
        /// The inner body.
        loc: SrcLoc,
    },

    /// An argument or result is wider than the method layout.
    #[error("{what} is {found} bits wide but the layout holds {expected}")]
    WidthMismatch {
        /// What was being connected.
        what: String,
        /// The layout width.
        expected: u32,
        /// The offered width.
        found: u32,
        /// The offending connection.
        loc: SrcLoc,
    },

    /// Misuse of the recording API.
    #[error("{message}")]
    Usage {
        /// What went wrong.
        message: String,
        /// The offending call.
        loc: SrcLoc,
    },

    /// A declared method never received a body.
    #[error("method `{name}` is declared but never defined")]
    UndefinedMethod {
        /// The method.
        name: String,
        /// Its declaration.
        loc: SrcLoc,
    },

    /// A value wider than 64 bits.
    #[error("{what} is {width} bits wide; at most 64 bits are supported")]
    TooWide {
        /// What is too wide.
        what: String,
        /// Its width.
        width: u32,
        /// Its declaration.
        loc: SrcLoc,
    },

    /// A method reaches itself through its own calls.
    #[error("method `{name}` calls itself through {}", .chain.join(" -> "))]
    MethodRecursion {
        /// The recursive method.
        name: String,
        /// The call chain closing the loop.
        chain: Vec<String>,
        /// The method's declaration.
        loc: SrcLoc,
    },

    /// A `single_caller` method has several callers.
    #[error("method `{name}` is single-caller but is called by {}", .callers.join(", "))]
    SingleCallerViolated {
        /// The method.
        name: String,
        /// Its callers.
        callers: Vec<String>,
        /// The method's declaration.
        loc: SrcLoc,
    },

    /// A nonexclusive method with input has no combiner.
    #[error("nonexclusive method `{name}` takes arguments but has no combiner")]
    MissingCombiner {
        /// The method.
        name: String,
        /// Its declaration.
        loc: SrcLoc,
    },

    /// Priority relations form a cycle.
    #[error("priority cycle between {}", .members.join(", "))]
    PriorityCycle {
        /// Transactions on the cycle.
        members: Vec<String>,
        /// A relation on the cycle.
        loc: SrcLoc,
    },

    /// Simultaneity cannot be satisfied.
    #[error("`{first}` and `{second}` cannot be made simultaneous: {reason}")]
    UnsatisfiableSimultaneity {
        /// The entity declaring simultaneity.
        first: String,
        /// The other side.
        second: String,
        /// Why not.
        reason: String,
        /// The first entity's declaration.
        loc: SrcLoc,
    },

    /// Simultaneity contradicts a declared independence.
    #[error("`{first}` and `{second}` are declared both simultaneous and independent")]
    IndependenceViolatesSimultaneity {
        /// One transaction.
        first: String,
        /// The other.
        second: String,
        /// The first transaction's declaration.
        loc: SrcLoc,
    },

    /// The emitted logic contains a combinational cycle.
    #[error("combinational cycle through {}", .signals.join(", "))]
    CombinationalCycle {
        /// Signals on the cycle.
        signals: Vec<String>,
        /// Declaration of a node owning one of the signals.
        loc: SrcLoc,
    },

    /// `schedule_before` contradicts definition order.
    #[error("`{before}` is scheduled before `{after}` but defined after it")]
    ScheduleOrder {
        /// The entity scheduled first.
        before: String,
        /// The entity scheduled second.
        after: String,
        /// The relation.
        loc: SrcLoc,
    },

    /// A broken elaborator invariant.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl ElabError {
    /// The stable diagnostic code of this error.
    pub fn code(&self) -> DiagnosticCode {
        match self {
            ElabError::Redefinition { .. } => E301,
            ElabError::CallUndefined { .. } => E302,
            ElabError::NoCurrentBody { .. } => E303,
            ElabError::DuplicateCall { .. } => E304,
            ElabError::NestedBody { .. } => E305,
            ElabError::WidthMismatch { .. } => E306,
            ElabError::Usage { .. } => E307,
            ElabError::UndefinedMethod { .. } => E308,
            ElabError::TooWide { .. } => E309,
            ElabError::MethodRecursion { .. } => E310,
            ElabError::SingleCallerViolated { .. } => E311,
            ElabError::MissingCombiner { .. } => E312,
            ElabError::PriorityCycle { .. } => E320,
            ElabError::UnsatisfiableSimultaneity { .. } => E321,
            ElabError::IndependenceViolatesSimultaneity { .. } => E322,
            ElabError::CombinationalCycle { .. } => E330,
            ElabError::ScheduleOrder { .. } => E331,
            ElabError::Internal(_) => E399,
        }
    }

    /// The primary location of this error.
    pub fn loc(&self) -> SrcLoc {
        match self {
            ElabError::Redefinition { loc, .. }
            | ElabError::CallUndefined { loc, .. }
            | ElabError::NoCurrentBody { loc, .. }
            | ElabError::DuplicateCall { loc, .. }
            | ElabError::NestedBody { loc, .. }
            | ElabError::WidthMismatch { loc, .. }
            | ElabError::Usage { loc, .. }
            | ElabError::UndefinedMethod { loc, .. }
            | ElabError::TooWide { loc, .. }
            | ElabError::MethodRecursion { loc, .. }
            | ElabError::SingleCallerViolated { loc, .. }
            | ElabError::MissingCombiner { loc, .. }
            | ElabError::PriorityCycle { loc, .. }
            | ElabError::UnsatisfiableSimultaneity { loc, .. }
            | ElabError::IndependenceViolatesSimultaneity { loc, .. }
            | ElabError::CombinationalCycle { loc, .. }
            | ElabError::ScheduleOrder { loc, .. } => *loc,
            ElabError::Internal(_) => SrcLoc::DUMMY,
        }
    }

    /// Converts this error into a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code(), self.to_string(), self.loc());
        match self {
            ElabError::Redefinition { prev_loc, .. } => {
                diag.with_label(Label::secondary(*prev_loc, "first defined here"))
            }
            ElabError::DuplicateCall { prev_loc, .. } => diag
                .with_label(Label::secondary(*prev_loc, "previous call here"))
                .with_help("place the calls in different branches of one `if`/`switch`"),
            ElabError::CallUndefined { .. } => {
                diag.with_help("define the method body before calling it")
            }
            ElabError::MissingCombiner { .. } => {
                diag.with_help("supply a combiner, e.g. `Combiner::sum()`")
            }
            ElabError::ScheduleOrder { .. } => diag.with_help(
                "use `schedule_before_silenced` or set `schedule_order` in tessel.toml",
            ),
            ElabError::CombinationalCycle { .. } => diag.with_note(
                "`ready` may depend on `run` or `grant` only across a schedule_before edge",
            ),
            _ => diag,
        }
    }
}

/// Creates a warning for a `schedule_before` contradicting definition order.
pub fn warning_schedule_order(before: &str, after: &str, loc: SrcLoc) -> Diagnostic {
    Diagnostic::warning(
        W301,
        format!("`{before}` is scheduled before `{after}` but defined after it"),
        loc,
    )
}

/// Creates a warning for a method nothing calls.
pub fn warning_unused_method(name: &str, loc: SrcLoc) -> Diagnostic {
    Diagnostic::warning(W302, format!("method `{name}` is never called"), loc)
        .with_help("remove the method or call it from a transaction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_diagnostics::Severity;

    #[test]
    fn code_display() {
        assert_eq!(format!("{E301}"), "E301");
        assert_eq!(format!("{W302}"), "W302");
    }

    #[test]
    fn priority_cycle_message() {
        let err = ElabError::PriorityCycle {
            members: vec!["t1".into(), "t2".into()],
            loc: SrcLoc::DUMMY,
        };
        assert_eq!(err.to_string(), "priority cycle between t1, t2");
        assert_eq!(err.code(), E320);
    }

    #[test]
    fn duplicate_call_diagnostic_has_label() {
        let err = ElabError::DuplicateCall {
            caller: "t".into(),
            method: "m".into(),
            loc: SrcLoc::new("a.rs", 3, 1),
            prev_loc: SrcLoc::new("a.rs", 2, 1),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code, E304);
        assert_eq!(diag.primary_loc.line, 3);
        assert_eq!(diag.labels.len(), 1);
        assert_eq!(diag.labels[0].loc.line, 2);
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn internal_error_is_transparent() {
        let err: ElabError = InternalError::new("missing signal").into();
        assert_eq!(err.code(), E399);
        assert!(err.to_string().contains("missing signal"));
        assert!(err.loc().is_dummy());
    }

    #[test]
    fn warnings() {
        let w = warning_unused_method("pop", SrcLoc::DUMMY);
        assert_eq!(w.severity, Severity::Warning);
        assert_eq!(w.code, W302);
        let w = warning_schedule_order("a", "b", SrcLoc::DUMMY);
        assert_eq!(w.code, W301);
        assert!(w.message.contains("`a`"));
    }
}
