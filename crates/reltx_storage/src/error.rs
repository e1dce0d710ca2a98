//! Error types for storage operations.

use crate::record::RecordKey;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A record that was expected to exist is missing.
    #[error("record not found: {0}")]
    RecordNotFound(RecordKey),

    /// A record was rejected because its contents are inconsistent.
    #[error("invalid record {key}: {message}")]
    InvalidRecord {
        /// The offending record.
        key: RecordKey,
        /// Description of the problem.
        message: String,
    },

    /// The storage is closed.
    #[error("storage is closed")]
    Closed,
}
