//! Error taxonomy for validation, patching, and batch orchestration.

use core::result;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = result::Result<T, FidelityError>;

/// Failures surfaced by the fidelity pipeline.
///
/// An unrecognized design-tree shape is not an error; it degrades to a warning
/// and an empty extraction.
#[derive(Debug, Error)]
pub enum FidelityError {
    /// A required input path does not exist.
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A design tree (or other JSON input) is not valid JSON.
    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing an outgoing report or response failed.
    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// An upstream collaborator throttled the request.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// Rewriting a stylesheet failed.
    #[error("failed to patch {}: {reason}", path.display())]
    PatchFailure { path: PathBuf, reason: String },

    /// A blocking worker or other unit-level task died.
    #[error("task for {unit} failed: {reason}")]
    Task { unit: String, reason: String },
}

impl FidelityError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether a retry after a fixed delay may succeed.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
