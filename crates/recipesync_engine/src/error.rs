//! Error types for the sync engine.

use recipesync_protocol::ProtocolError;
use recipesync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server answered with a non-success status.
    #[error("server returned status {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Remote data broke an invariant the merge relies on.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Wire encoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Local store error during sync.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates an invariant violation.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Returns true if re-triggering the round may succeed.
    ///
    /// The coordinator never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Server { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if the server rejected the credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SyncError::Server { status: 401 | 403, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Server { status: 503, message: String::new() }.is_retryable());
        assert!(SyncError::Server { status: 429, message: String::new() }.is_retryable());
        assert!(!SyncError::Server { status: 400, message: String::new() }.is_retryable());
        assert!(!SyncError::invariant("created entry without id").is_retryable());
    }

    #[test]
    fn unauthorized() {
        let err = SyncError::Server {
            status: 401,
            message: "token expired".into(),
        };
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("token expired"));
    }
}
