//! Error types for the engines.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised inside the engines.
///
/// None of these escape a worker: per-item failures are classified into
/// messages on the item's result.
#[derive(Debug, Error)]
pub enum OpsError {
    /// I/O failure at a path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copy-based transfer failed for a reason other than I/O.
    #[error("Transfer of {path} failed: {message}")]
    Transfer { path: PathBuf, message: String },

    /// A precondition for reversing an action does not hold.
    #[error("{reason}: {path}")]
    Blocked { path: PathBuf, reason: &'static str },

    /// No move strategy is configured.
    #[error("No move strategy available")]
    NoStrategy,

    /// The trash facility failed.
    #[error("Trash operation failed: {message}")]
    Trash { message: String },

    /// The trash facility is not usable on this platform.
    #[error("Trash is not available")]
    TrashUnavailable,

    /// A worker no longer accepts jobs.
    #[error("Worker '{name}' is shut down")]
    WorkerClosed { name: &'static str },

    /// A blocking task panicked or was cancelled.
    #[error("Task failed: {message}")]
    TaskFailed { message: String },
}

impl OpsError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Convert a copy failure, keeping the I/O cause when there is one.
    pub fn transfer(path: impl Into<PathBuf>, err: fs_extra::error::Error) -> Self {
        use fs_extra::error::ErrorKind;

        let path = path.into();
        let message = err.to_string();
        let kind = match err.kind {
            ErrorKind::Io(source) => return Self::io(path, source),
            ErrorKind::NotFound => std::io::ErrorKind::NotFound,
            ErrorKind::PermissionDenied => std::io::ErrorKind::PermissionDenied,
            ErrorKind::AlreadyExists => std::io::ErrorKind::AlreadyExists,
            _ => return Self::Transfer { path, message },
        };
        Self::io(path, std::io::Error::new(kind, message))
    }
}

impl From<tokio::task::JoinError> for OpsError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed {
            message: err.to_string(),
        }
    }
}

impl From<trash::Error> for OpsError {
    fn from(err: trash::Error) -> Self {
        Self::Trash {
            message: err.to_string(),
        }
    }
}
