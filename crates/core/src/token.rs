//! Revocation tokens

use crate::error::AspectError;
use crate::registry::{self, TokenId};

/// Handle for one registered aspect, returned by
/// [`hook_object`](crate::hook_object) and
/// [`hook_class`](crate::hook_class).
///
/// The token is the only way to remove that registration again. It is
/// `Copy`, so it can be stashed, sent across threads, and used after the
/// aspect is already gone; stale tokens are recognized and report so.
///
/// # Example
///
/// ```
/// use weft_core::{hook_object, Advice, AspectOptions};
/// use weft_runtime::{selector, ClassBuilder};
///
/// let class = ClassBuilder::new("TokenDocWidget")
///     .method("ping", weft_runtime::method!(|_this| -> i64 { 7 }))
///     .register();
/// let widget = weft_runtime::store::alloc(class).unwrap();
///
/// let token = hook_object(
///     widget,
///     selector("ping", 0),
///     AspectOptions::BEFORE,
///     Advice::observe(|_| Ok(())),
/// )
/// .unwrap();
///
/// assert_eq!(token.remove().unwrap(), true);
/// assert_eq!(token.remove().unwrap(), false);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectToken {
    id: TokenId,
}

impl AspectToken {
    pub(crate) fn new(id: TokenId) -> Self {
        Self { id }
    }

    pub(crate) fn id(self) -> TokenId {
        self.id
    }

    /// Removes the registration this token stands for and restores plain
    /// dispatch when it was the last aspect on its target and selector.
    ///
    /// Returns `Ok(true)` when this call did the removal and `Ok(false)`
    /// when the registration was already gone, through an earlier call,
    /// `AUTOMATIC_REMOVAL`, or a reclaimed destruction report. When the
    /// hooked object was destroyed with the aspect still installed, the
    /// first call reports [`AspectError::ObjectAlreadyDestroyed`] and
    /// later calls return `Ok(false)`.
    pub fn remove(self) -> Result<bool, AspectError> {
        registry::unhook(self)
    }
}
