//! Journal error types.

use daybook_shared::{AppError, JournalId};
use thiserror::Error;

use super::validation::FieldErrors;
use crate::storage::StorageError;

/// Journal operation errors.
#[derive(Debug, Error)]
pub enum JournalError {
    /// One or more fields are invalid.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// The entry belongs to another user.
    #[error("journal {0} belongs to another user")]
    Forbidden(JournalId),

    /// Journal entry not found.
    #[error("journal not found: {0}")]
    NotFound(JournalId),

    /// The entry changed since the client last read it.
    #[error("journal {id} is at version {actual}, expected {expected}")]
    Conflict {
        /// Entry ID.
        id: JournalId,
        /// Version the client sent.
        expected: i32,
        /// Version currently stored.
        actual: i32,
    },

    /// Storing the image failed; nothing was persisted.
    #[error("image upload failed: {0}")]
    MediaUploadFailed(#[source] StorageError),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl JournalError {
    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

impl From<FieldErrors> for JournalError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<JournalError> for AppError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Validation(errors) => Self::Validation(errors.summary()),
            JournalError::Forbidden(_) => {
                Self::Forbidden("You do not have access to this journal".to_string())
            }
            JournalError::NotFound(_) => Self::NotFound("Journal not found".to_string()),
            JournalError::Conflict { actual, .. } => Self::Conflict(format!(
                "Journal was modified by another request (current version {actual})"
            )),
            JournalError::MediaUploadFailed(e) => Self::ExternalService(e.to_string()),
            JournalError::Repository(msg) => Self::Database(msg),
        }
    }
}
