//! Error types for the local store.

use crate::types::{RecordId, Table};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] recipesync_storage::StorageError),

    /// A journal frame could not be encoded or decoded.
    #[error("journal codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// The journal is corrupted beyond the recoverable tail.
    #[error("journal corruption at offset {offset}: {message}")]
    JournalCorruption {
        /// Byte offset of the bad frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Record not found, or only present as a tombstone.
    #[error("record {id} not found in table {table}")]
    NotFound {
        /// The table searched.
        table: Table,
        /// The record ID that was not found.
        id: RecordId,
    },

    /// A record could not be read as the requested model.
    #[error("invalid {table} record {id}: {message}")]
    InvalidRecord {
        /// The table of the record.
        table: Table,
        /// The offending record.
        id: RecordId,
        /// What was wrong with it.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl StoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(table: Table, id: RecordId, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            table,
            id,
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_table() {
        let id = RecordId::new();
        let err = StoreError::NotFound {
            table: Table::Recipes,
            id,
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("recipes"));
        assert!(err.to_string().contains(&id.to_string()));
    }
}
