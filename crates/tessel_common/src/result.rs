//! Internal error type for invariant violations inside the elaborator.

/// Result type for operations that can only fail because of a bug in Tessel.
///
/// User mistakes (undefined methods, priority cycles, ...) are reported
/// through the elaboration error type and the diagnostic sink. `Err` here
/// means an internal invariant was broken.
pub type TesselResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in Tessel, not a problem with the
/// user's transaction graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal elaborator error: {message}")]
pub struct InternalError {
    /// Description of the broken invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("grant driven twice");
        assert_eq!(
            format!("{err}"),
            "internal elaborator error: grant driven twice"
        );
    }

    #[test]
    fn from_string() {
        let err: InternalError = "missing node".to_string().into();
        assert_eq!(err.message, "missing node");
    }
}
