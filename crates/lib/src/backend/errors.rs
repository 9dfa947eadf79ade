//! Error types for format backends.

use std::path::PathBuf;

use thiserror::Error;

/// Structured error types for backend load/save operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// No backends are registered, so no document can be opened or saved
    #[error("no configuration backends registered")]
    NoBackends,

    /// Reading the document from disk failed
    #[error("failed to read {path}: {source}")]
    Load {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document could not be parsed by the backend's format
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// Writing the document to disk failed
    #[error("failed to write {path}: {source}")]
    Save {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The tree value could not be represented in the backend's format
    #[error("failed to serialize {path}: {reason}")]
    Serialize { path: PathBuf, reason: String },
}

impl BackendError {
    /// Check if this error means no backends were registered
    pub fn is_no_backends(&self) -> bool {
        matches!(self, BackendError::NoBackends)
    }

    /// Check if this error is a format error rather than an I/O failure
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            BackendError::Parse { .. } | BackendError::Serialize { .. }
        )
    }

    /// Check if this error wraps an I/O failure
    pub fn is_io_error(&self) -> bool {
        matches!(self, BackendError::Load { .. } | BackendError::Save { .. })
    }

    /// Get the document path if this error is tied to one
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            BackendError::Load { path, .. }
            | BackendError::Parse { path, .. }
            | BackendError::Save { path, .. }
            | BackendError::Serialize { path, .. } => Some(path),
            BackendError::NoBackends => None,
        }
    }
}
