//! Authentication middleware for protected routes.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

use crate::AppState;
use daybook_shared::UserId;

/// Authentication middleware that resolves the caller before any handler runs.
///
/// This middleware:
/// 1. Reads the `Authorization` header
/// 2. Resolves it to a caller through the access gate
/// 3. Stores the caller's `UserId` in request extensions for handlers to access
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match state.gate.resolve_caller(auth_header) {
        Ok(user_id) => {
            request.extensions_mut().insert(user_id);
            next.run(request).await
        }
        Err(e) => {
            debug!(reason = e.code(), path = %request.uri().path(), "Rejected request");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": e.code(), "message": e.message() })),
            )
                .into_response()
        }
    }
}

/// Extractor for the authenticated caller.
///
/// Only valid behind [`auth_middleware`]:
///
/// ```ignore
/// async fn handler(auth: AuthUser) -> impl IntoResponse {
///     let caller = auth.user_id();
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

impl AuthUser {
    /// Returns the caller's user ID.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserId>()
            .copied()
            .map(AuthUser)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "error": "unauthorized",
                        "message": "Authentication required"
                    })),
                )
            })
    }
}
