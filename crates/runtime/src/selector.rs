//! Interned method selectors
//!
//! A selector identifies a method by name and argument count. Interning
//! makes selectors cheap to copy, hash, and compare, which matters because
//! dispatch tables and interception registries key off them on every call.

use std::sync::LazyLock;

use dashmap::DashMap;
use parking_lot::RwLock;

/// Interned selector handle. Two selectors are equal iff they intern the
/// same `(name, arity)` pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(u32);

struct SelectorInfo {
    name: String,
    arity: usize,
}

/// Id-ordered intern table. Append-only.
static SELECTORS: LazyLock<RwLock<Vec<SelectorInfo>>> = LazyLock::new(|| RwLock::new(Vec::new()));

/// Reverse index from `(name, arity)` to the interned handle.
static SELECTOR_INDEX: LazyLock<DashMap<(String, usize), Selector>> = LazyLock::new(DashMap::new);

/// Interns a selector, returning the existing handle if the pair was seen
/// before.
pub fn selector(name: &str, arity: usize) -> Selector {
    let key = (name.to_string(), arity);
    if let Some(existing) = SELECTOR_INDEX.get(&key) {
        return *existing;
    }

    *SELECTOR_INDEX.entry(key).or_insert_with(|| {
        let mut table = SELECTORS.write();
        let id = Selector(table.len() as u32);
        table.push(SelectorInfo {
            name: name.to_string(),
            arity,
        });
        id
    })
}

impl Selector {
    /// Looks up an already interned selector without creating one.
    pub fn lookup(name: &str, arity: usize) -> Option<Selector> {
        SELECTOR_INDEX
            .get(&(name.to_string(), arity))
            .map(|entry| *entry)
    }

    /// Method name this selector was interned with.
    pub fn name(&self) -> String {
        let table = SELECTORS.read();
        match table.get(self.0 as usize) {
            Some(info) => info.name.clone(),
            None => String::new(),
        }
    }

    /// Argument count this selector was interned with.
    pub fn arity(&self) -> usize {
        let table = SELECTORS.read();
        match table.get(self.0 as usize) {
            Some(info) => info.arity,
            None => 0,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = SELECTORS.read();
        match table.get(self.0 as usize) {
            Some(info) => write!(f, "{}/{}", info.name, info.arity),
            None => write!(f, "?/{}", self.0),
        }
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Selector({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_stable() {
        let a = selector("sel_stable", 2);
        let b = selector("sel_stable", 2);
        assert_eq!(a, b);
        assert_eq!(a.name(), "sel_stable");
        assert_eq!(a.arity(), 2);
    }

    #[test]
    fn test_arity_distinguishes_selectors() {
        let zero = selector("sel_arity", 0);
        let one = selector("sel_arity", 1);
        assert_ne!(zero, one);
        assert_eq!(zero.to_string(), "sel_arity/0");
        assert_eq!(one.to_string(), "sel_arity/1");
    }

    #[test]
    fn test_lookup_does_not_intern() {
        assert!(Selector::lookup("sel_never_interned", 3).is_none());
        let s = selector("sel_looked_up", 1);
        assert_eq!(Selector::lookup("sel_looked_up", 1), Some(s));
    }
}
