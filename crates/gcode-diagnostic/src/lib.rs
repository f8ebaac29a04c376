//! Diagnostic data model shared by every pipeline stage.
//!
//! This crate defines the two-severity [`Diagnostic`] model used across
//! parsing, semantic analysis, lowering, and the executor. It is
//! deliberately small: unlike an LSP-facing diagnostics taxonomy with many
//! stable codes and tags, this pipeline only ever needs Error/Warning plus
//! a message and a location.

use gcode_position::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a [`Diagnostic`]. Errors are fatal to fail-fast message
/// lowering; warnings are accumulated and do not stop the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    /// The lowercase string used in debug output and JSON (`"error"` / `"warning"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single diagnostic attached to a location in the source program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, location: Location) -> Self {
        Self { severity: Severity::Error, message: message.into(), location }
    }

    pub fn warning(message: impl Into<String>, location: Location) -> Self {
        Self { severity: Severity::Warning, message: message.into(), location }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.severity, self.location, self.message)
    }
}

/// True if any diagnostic in `diagnostics` is an Error at the given `line_index`.
pub fn has_error_at_line(diagnostics: &[Diagnostic], line_index: u32) -> bool {
    diagnostics.iter().any(|d| d.is_error() && d.location.line == line_index)
}

/// All error diagnostics whose location is on `line_index`, in discovery order.
pub fn errors_at_line(diagnostics: &[Diagnostic], line_index: u32) -> Vec<Diagnostic> {
    diagnostics.iter().filter(|d| d.is_error() && d.location.line == line_index).cloned().collect()
}

/// True if any diagnostic in the slice has Error severity, regardless of location.
/// Used by the CLI's exit-code contract: any Error in the final stage's
/// diagnostics means a non-zero exit.
pub fn has_any_error(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_as_str_is_lowercase() {
        assert_eq!(Severity::Error.as_str(), "error");
        assert_eq!(Severity::Warning.as_str(), "warning");
    }

    #[test]
    fn has_error_at_line_matches_only_errors() {
        let diags = vec![
            Diagnostic::warning("w", Location::new(1, 1)),
            Diagnostic::error("e", Location::new(2, 1)),
        ];
        assert!(!has_error_at_line(&diags, 1));
        assert!(has_error_at_line(&diags, 2));
    }

    #[test]
    fn errors_at_line_filters_and_preserves_order() {
        let diags = vec![
            Diagnostic::error("first", Location::new(3, 1)),
            Diagnostic::warning("ignored", Location::new(3, 2)),
            Diagnostic::error("second", Location::new(3, 4)),
        ];
        let found = errors_at_line(&diags, 3);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].message, "first");
        assert_eq!(found[1].message, "second");
    }

    #[test]
    fn has_any_error_detects_single_error() {
        assert!(!has_any_error(&[Diagnostic::warning("w", Location::origin())]));
        assert!(has_any_error(&[Diagnostic::error("e", Location::origin())]));
    }
}
