//! 1-based line/column source locations used throughout the gcode pipeline.
//!
//! Unlike a byte-offset span, a [`Location`] is a single point: every
//! diagnostic and every lowered artifact in this pipeline is anchored to
//! exactly one `(line, column)` pair, never a range. Both components are
//! 1-based to match how the tokenizer and the CLI report positions to users.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 1-based `(line, column)` position in source text.
///
/// # Invariants
///
/// - `line >= 1` and `column >= 1` for any location produced by the parser.
///   `Location::origin()` (1, 1) is the only location used when no better
///   position is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// Creates a new location. No validation is performed; callers are
    /// expected to only ever construct locations from tokenizer positions.
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// The `(1, 1)` location used as a fallback when no finer position is known.
    #[inline]
    pub const fn origin() -> Self {
        Self { line: 1, column: 1 }
    }

    /// A location at the given line, column 1. Used for diagnostics that are
    /// attached to a whole line rather than a specific token (e.g. executor
    /// faults, which always report column 1 of the faulting instruction's line).
    #[inline]
    pub const fn at_line(line: u32) -> Self {
        Self { line, column: 1 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
