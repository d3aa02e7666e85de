//! Error types for hook registration and removal

use thiserror::Error;
use weft_runtime::CallError;

/// Errors returned by [`hook_object`], [`hook_class`] and token removal.
///
/// Registration is all-or-nothing: when any of these comes back, no
/// dispatch table was touched and no entry was recorded.
///
/// [`hook_object`]: crate::registry::hook_object
/// [`hook_class`]: crate::registry::hook_class
#[derive(Error, Debug)]
pub enum AspectError {
    /// The selector is load-bearing for the ownership protocol and may
    /// never be intercepted
    #[error("selector {0} may not be intercepted")]
    SelectorBlacklisted(String),

    /// The target's class chain has no implementation for the selector
    #[error("{class} does not respond to {selector}")]
    DoesNotRespondToSelector {
        /// Class of the target
        class: String,
        /// Selector that failed to resolve
        selector: String,
    },

    /// `dealloc` advice can only observe the teardown, not replace or
    /// follow it
    #[error("dealloc only accepts before advice")]
    DeallocPosition,

    /// The selector already carries a class-wide hook elsewhere in the
    /// same hierarchy
    #[error("{selector} is already hooked on {hooked}, a relative of {class}")]
    AlreadyHookedInClassHierarchy {
        /// Selector being hooked
        selector: String,
        /// Class the caller tried to hook
        class: String,
        /// Class that already carries the hook
        hooked: String,
    },

    /// Installing the per-object dispatch entry failed
    #[error("failed to extend {object}: {source}")]
    FailedToExtendInstance {
        /// The object that could not be extended
        object: String,
        /// Underlying dispatch error
        #[source]
        source: CallError,
    },

    /// The advice declares no parameter signature, so compatibility with
    /// the method cannot be checked
    #[error("advice declares no parameter signature")]
    MissingAdviceSignature,

    /// The advice signature cannot be applied to the method
    #[error("incompatible advice signature: {0}")]
    IncompatibleAdviceSignature(String),

    /// The options value does not decode to a single pipeline position
    #[error("invalid aspect options: {0}")]
    InvalidOptions(String),

    /// The target object was destroyed, either before registration or
    /// while the hook was still installed
    #[error("target object has already been destroyed")]
    ObjectAlreadyDestroyed,
}
