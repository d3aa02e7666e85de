//! Hook placement and lifecycle options

use std::fmt;

use bitflags::bitflags;

use crate::error::AspectError;

bitflags! {
    /// Options accepted at hook registration.
    ///
    /// The low three bits form a position field rather than independent
    /// flags: exactly one of [`BEFORE`](Self::BEFORE),
    /// [`INSTEAD`](Self::INSTEAD) or [`AFTER`](Self::AFTER) applies, with
    /// `BEFORE` as the zero default. Combining `INSTEAD` with `AFTER` does
    /// not decode and is rejected as [`AspectError::InvalidOptions`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AspectOptions: u32 {
        /// Run the advice before the original implementation (default)
        const BEFORE = 0x00;
        /// Run the advice instead of the original implementation
        const INSTEAD = 0x01;
        /// Run the advice after the original implementation
        const AFTER = 0x02;
        /// Remove the hook after the call it first takes part in
        const AUTOMATIC_REMOVAL = 0x08;
    }
}

impl Default for AspectOptions {
    fn default() -> Self {
        AspectOptions::BEFORE
    }
}

/// Where in the call pipeline an aspect runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Observation before the original implementation
    Before,
    /// Replacement of the original implementation
    Instead,
    /// Observation after the original implementation returned
    After,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Before => write!(f, "before"),
            Position::Instead => write!(f, "instead"),
            Position::After => write!(f, "after"),
        }
    }
}

impl AspectOptions {
    const POSITION_MASK: u32 = 0x07;

    /// Decodes the position field.
    pub fn position(self) -> Result<Position, AspectError> {
        match self.bits() & Self::POSITION_MASK {
            0x00 => Ok(Position::Before),
            0x01 => Ok(Position::Instead),
            0x02 => Ok(Position::After),
            other => Err(AspectError::InvalidOptions(format!(
                "position bits {other:#x} name no single position"
            ))),
        }
    }

    /// Whether the hook removes itself after its first call.
    pub fn automatic_removal(self) -> bool {
        self.contains(Self::AUTOMATIC_REMOVAL)
    }
}
