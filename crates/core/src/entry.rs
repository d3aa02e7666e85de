//! Registered aspect entries

use std::sync::atomic::{AtomicBool, Ordering};

use weft_runtime::Selector;

use crate::advice::Advice;
use crate::options::{AspectOptions, Position};
use crate::registry::TargetKey;

/// One registered aspect: target, placement, and the advice to run.
///
/// Entries are shared between the registry and in-flight call snapshots
/// behind an `Arc`. The `alive` flag is the only mutable part: removal
/// clears it so snapshots taken earlier skip the entry, and clearing it is
/// a one-way transition.
pub(crate) struct AspectEntry {
    pub(crate) target: TargetKey,
    pub(crate) selector: Selector,
    pub(crate) position: Position,
    pub(crate) options: AspectOptions,
    pub(crate) advice: Advice,
    alive: AtomicBool,
}

impl AspectEntry {
    pub(crate) fn new(
        target: TargetKey,
        selector: Selector,
        position: Position,
        options: AspectOptions,
        advice: Advice,
    ) -> Self {
        Self {
            target,
            selector,
            position,
            options,
            advice,
            alive: AtomicBool::new(true),
        }
    }

    /// Whether the entry still takes part in pipelines.
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Marks the entry dead. Returns whether this call made the
    /// transition, which at most one caller observes.
    pub(crate) fn deactivate(&self) -> bool {
        self.alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn automatic_removal(&self) -> bool {
        self.options.automatic_removal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::Advice;

    #[test]
    fn test_deactivate_is_one_way_and_exclusive() {
        let entry = AspectEntry::new(
            TargetKey::Instance(weft_runtime::ObjectRef::null()),
            weft_runtime::selector("entry_flag", 0),
            Position::Before,
            AspectOptions::BEFORE,
            Advice::observe(|_| Ok(())),
        );
        assert!(entry.is_alive());
        assert!(entry.deactivate());
        assert!(!entry.deactivate());
        assert!(!entry.is_alive());
    }
}
