//! Backend-agnostic storage errors.

use std::error::Error;

use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend is unreachable or the operation failed transiently.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable detail.
        message: String,
        /// Backend-specific cause.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A save carried a stale revision; another writer got there first.
    #[error("revision conflict on document `{id}`")]
    Conflict {
        /// Document whose write conflicted.
        id: Uuid,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
