//! Storage error types.

use std::time::Duration;

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Transport, authentication or timeout failure talking to the provider.
    #[error("storage provider unavailable: {0}")]
    Unavailable(String),

    /// The provider (or the gateway's own limits) refused the content.
    #[error("payload rejected: {0}")]
    PayloadRejected(String),

    /// Storage provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a payload rejected error.
    #[must_use]
    pub fn payload_rejected(msg: impl Into<String>) -> Self {
        Self::PayloadRejected(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a file too large error.
    #[must_use]
    pub fn file_too_large(size: u64, max: u64) -> Self {
        Self::PayloadRejected(format!(
            "file size {size} bytes exceeds maximum allowed {max} bytes"
        ))
    }

    /// Create an invalid MIME type error.
    #[must_use]
    pub fn invalid_mime_type(mime_type: &str) -> Self {
        Self::PayloadRejected(format!("MIME type '{mime_type}' is not allowed"))
    }

    /// Create a timeout error for `operation`.
    #[must_use]
    pub fn timed_out(operation: &str, limit: Duration) -> Self {
        Self::Unavailable(format!(
            "{operation} timed out after {}ms",
            limit.as_millis()
        ))
    }

    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::ConfigInvalid => Self::Configuration(err.to_string()),
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Unavailable(format!("request timed out: {err}"))
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
