//! Ambient tooling errors.
//!
//! [`Diagnostic`](gcode_diagnostic::Diagnostic) models a defect in the NC
//! program being compiled; [`GcodeToolingError`] models a defect in running
//! the tool itself — a file that can't be read, a JSON document that can't
//! be decoded, a CLI invocation that doesn't make sense. The two are never
//! interchangeable: a tooling error aborts the operation entirely, while a
//! diagnostic is just data flowing through the pipeline.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GcodeToolingError>;

/// Errors raised by the tooling layer (CLI, JSON codec, file I/O) rather
/// than by the compiler pipeline itself.
#[derive(Error, Debug)]
pub enum GcodeToolingError {
    /// Reading the source file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stage's JSON projection failed to parse.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// The CLI was invoked with an unsupported flag value or combination.
    #[error("usage error: {0}")]
    Usage(String),
}

impl GcodeToolingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}
