//! Per-target aspect containers

use weft_runtime::{ClassId, Method, ObjectRef};

use crate::options::Position;
use crate::registry::TokenId;

/// How a redirect was installed, so removal can put the tables back.
pub(crate) enum Anchor {
    /// Class-wide: the trampoline sits in the class's own method table.
    /// `displaced` is the own-table entry it replaced; `None` means the
    /// selector was inherited and removal deletes the own entry again.
    Class {
        class: ClassId,
        displaced: Option<Method>,
    },
    /// Single-instance: the trampoline is a per-object dispatch override.
    /// `displaced` is a pre-existing override it shadowed.
    Instance {
        object: ObjectRef,
        displaced: Option<Method>,
    },
}

/// Aspect lists for one `(target, selector)` pair.
///
/// Each position keeps registration order; execution walks the lists
/// front to back.
pub(crate) struct AspectContainer {
    pub(crate) before: Vec<TokenId>,
    pub(crate) instead: Vec<TokenId>,
    pub(crate) after: Vec<TokenId>,
    /// True original implementation, with any redirects unwound.
    pub(crate) original: Method,
    pub(crate) anchor: Anchor,
}

impl AspectContainer {
    pub(crate) fn new(original: Method, anchor: Anchor) -> Self {
        Self {
            before: Vec::new(),
            instead: Vec::new(),
            after: Vec::new(),
            original,
            anchor,
        }
    }

    pub(crate) fn add(&mut self, position: Position, token: TokenId) {
        match position {
            Position::Before => self.before.push(token),
            Position::Instead => self.instead.push(token),
            Position::After => self.after.push(token),
        }
    }

    /// Removes the token from whichever list holds it.
    pub(crate) fn remove(&mut self, token: TokenId) -> bool {
        for list in [&mut self.before, &mut self.instead, &mut self.after] {
            if let Some(at) = list.iter().position(|t| *t == token) {
                list.remove(at);
                return true;
            }
        }
        false
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.before.is_empty() && self.instead.is_empty() && self.after.is_empty()
    }

    pub(crate) fn tokens(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.before
            .iter()
            .chain(self.instead.iter())
            .chain(self.after.iter())
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;
    use weft_runtime::Value;

    use super::*;

    fn ids(n: usize) -> Vec<TokenId> {
        let mut slots: SlotMap<TokenId, ()> = SlotMap::with_key();
        (0..n).map(|_| slots.insert(())).collect()
    }

    fn container() -> AspectContainer {
        AspectContainer::new(
            Method::new(0, |_, _| Ok(Value::Nil)),
            Anchor::Instance {
                object: ObjectRef::null(),
                displaced: None,
            },
        )
    }

    #[test]
    fn test_lists_keep_registration_order() {
        let toks = ids(3);
        let mut c = container();
        c.add(Position::Before, toks[0]);
        c.add(Position::Before, toks[1]);
        c.add(Position::After, toks[2]);

        assert_eq!(c.before, vec![toks[0], toks[1]]);
        assert_eq!(c.after, vec![toks[2]]);
        assert!(c.instead.is_empty());
        assert_eq!(c.tokens().count(), 3);
    }

    #[test]
    fn test_remove_empties_container() {
        let toks = ids(2);
        let mut c = container();
        c.add(Position::Instead, toks[0]);
        c.add(Position::Before, toks[1]);

        assert!(c.remove(toks[0]));
        assert!(!c.remove(toks[0]));
        assert!(!c.is_empty());
        assert!(c.remove(toks[1]));
        assert!(c.is_empty());
    }
}
