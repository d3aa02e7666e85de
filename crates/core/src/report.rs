//! Registry diagnostics
//!
//! A point-in-time description of everything currently hooked, for debug
//! commands and leak hunting. Rows are sorted by target label and
//! selector so successive reports diff cleanly.

use serde::{Deserialize, Serialize};

use crate::registry;

/// One hooked `(target, selector)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerReport {
    /// Class name, or the object's display form for instance hooks.
    pub target: String,

    /// `"class"` or `"instance"`.
    pub mode: String,

    /// Selector in `name/arity` form.
    pub selector: String,

    /// Advice counts per position.
    pub before: usize,
    pub instead: usize,
    pub after: usize,
}

/// Snapshot of the whole registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryReport {
    pub containers: Vec<ContainerReport>,

    /// Registrations still installed.
    pub live_entries: usize,

    /// Entries whose object was destroyed and whose token has not
    /// reclaimed them yet.
    pub orphaned_entries: usize,
}

impl RegistryReport {
    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Captures the current registry state.
pub fn registry_report() -> RegistryReport {
    registry::report_snapshot()
}
