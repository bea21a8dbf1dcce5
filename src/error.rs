//! Service-level error taxonomy with stable reason codes.

use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::storage::StorageError,
    game::{TransitionError, ValidationError},
};

/// Errors surfaced by service layer operations.
///
/// Expected guard failures are values, never panics: callers receive a
/// `Rejected`-style result carrying a stable reason code and can correct
/// their input (`Validation`) or re-fetch current state (`Guard`,
/// `Conflict`) before retrying.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input rejected before any store write.
    #[error("validation failed ({code}): {message}")]
    Validation {
        /// Stable reason code.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
    /// Wrong actor or wrong current state for the requested transition.
    #[error("guard violation ({code}): {message}")]
    Guard {
        /// Stable reason code.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
    /// Requested document does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Another writer updated the document since it was read.
    #[error("conflicting write on document `{id}`; re-read and retry")]
    Conflict {
        /// Document whose write conflicted.
        id: Uuid,
    },
    /// Storage backend is unreachable; retryable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
}

impl ServiceError {
    /// Stable reason code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation { code, .. } => code,
            ServiceError::Guard { code, .. } => code,
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict { .. } => "conflict",
            ServiceError::Unavailable(_) => "store_unavailable",
        }
    }

    /// Build a validation error from a code and message.
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            code,
            message: message.into(),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { id } => ServiceError::Conflict { id },
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        let code = err.code();
        match err {
            TransitionError::Validation(inner) => ServiceError::Validation {
                code,
                message: inner.to_string(),
            },
            TransitionError::Guard(inner) => ServiceError::Guard {
                code,
                message: inner.to_string(),
            },
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<crate::league::MalformedWindow> for ServiceError {
    fn from(err: crate::league::MalformedWindow) -> Self {
        ServiceError::Validation {
            code: "malformed_season_window",
            message: err.to_string(),
        }
    }
}
