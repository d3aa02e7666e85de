//! Error types for runtime dispatch

use thiserror::Error;

/// Errors surfaced by message dispatch and object lifecycle operations
#[derive(Error, Debug)]
pub enum CallError {
    /// The receiver handle refers to an object that has been destroyed
    #[error("receiver is no longer alive")]
    DeadObject,

    /// No method for the selector anywhere in the receiver's class chain
    #[error("{class} does not respond to {selector}")]
    DoesNotRespond {
        /// Class of the receiver at dispatch time
        class: String,
        /// Selector that failed to resolve
        selector: String,
    },

    /// Argument count does not match the resolved method's arity
    #[error("{selector} expects {expected} arguments, {given} given")]
    ArityMismatch {
        /// Selector being dispatched
        selector: String,
        /// Arity declared by the method
        expected: usize,
        /// Number of arguments supplied by the caller
        given: usize,
    },

    /// An argument or return value had the wrong runtime type
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Kind the callee required
        expected: &'static str,
        /// Kind actually supplied
        found: &'static str,
    },

    /// Error raised by a method body or an interception behavior
    #[error(transparent)]
    Raised(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl CallError {
    /// Wraps an arbitrary error (or message) as a raised call failure.
    pub fn raised(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        CallError::Raised(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CallError::DoesNotRespond {
            class: "Counter".to_string(),
            selector: "incr/1".to_string(),
        };
        assert_eq!(err.to_string(), "Counter does not respond to incr/1");

        let err = CallError::ArityMismatch {
            selector: "add/2".to_string(),
            expected: 2,
            given: 3,
        };
        assert_eq!(err.to_string(), "add/2 expects 2 arguments, 3 given");
    }

    #[test]
    fn test_raised_from_message() {
        let err = CallError::raised("boom");
        assert_eq!(err.to_string(), "boom");
    }
}
