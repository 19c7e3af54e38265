use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend could not be reached or failed unexpectedly.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Context of the failed operation.
        message: String,
        /// Backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The expected head sequence no longer matches: another writer got there first.
    #[error("write conflict on match `{match_id}`: expected head {expected}")]
    Conflict {
        /// Match being written.
        match_id: Uuid,
        /// Head sequence the writer based its change on.
        expected: u64,
    },
    /// The addressed match or event does not exist.
    #[error("`{0}` not found in storage")]
    NotFound(Uuid),
    /// Stored data cannot be decoded.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Whether the failure is an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}
