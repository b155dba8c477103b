//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use daybook_core::journal::{FieldErrors, JournalError};
use daybook_shared::AppError;

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned by handlers.
///
/// Renders as `{"error": code, "message": msg}`; validation failures also carry
/// `errors: {field: [msg]}`.
#[derive(Debug)]
pub enum ApiError {
    /// Field-level validation failure.
    Validation(FieldErrors),
    /// Any other application error.
    App(AppError),
}

impl ApiError {
    /// The status this error renders with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::App(err) => StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Rejects a request whose path names no journal.
    #[must_use]
    pub fn journal_not_found() -> Self {
        Self::App(AppError::NotFound("Journal not found".to_string()))
    }

    /// Rejects a malformed request body.
    #[must_use]
    pub fn bad_form(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::default();
        errors.add(field, message);
        Self::Validation(errors)
    }
}

impl From<JournalError> for ApiError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Validation(errors) => Self::Validation(errors),
            other => Self::App(AppError::from(other)),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(errors) => json!({
                "error": "validation_failed",
                "message": errors.summary(),
                "errors": errors,
            }),
            Self::App(err) => {
                if status.is_server_error() {
                    error!(error = %err, "Request failed");
                }
                json!({
                    "error": err.error_code(),
                    "message": err.public_message(),
                })
            }
        };

        (status, Json(body)).into_response()
    }
}
