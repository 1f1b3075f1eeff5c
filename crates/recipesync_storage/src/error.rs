//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another handle already holds the journal lock.
    #[error("storage locked: {path} is held by another process")]
    Locked {
        /// Path of the locked file.
        path: PathBuf,
    },

    /// The journal handle was lost after its file was replaced; nothing
    /// more can be written through this backend.
    #[error("storage detached: {path} could not be reopened")]
    Detached {
        /// Path of the journal.
        path: PathBuf,
    },
}
