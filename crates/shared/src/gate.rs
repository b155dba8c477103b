//! Access gate: turns an inbound credential into a caller identity.
//!
//! The gate only answers "who is calling". Whether that caller may touch a given journal is
//! decided by the journal service, which re-checks ownership on every entry it loads.

use thiserror::Error;

use crate::jwt::{JwtError, JwtService};
use crate::types::UserId;

/// Reasons a credential does not resolve to a caller.
#[derive(Debug, Error)]
pub enum AccessError {
    /// No bearer credential was presented.
    #[error("missing bearer credential")]
    MissingCredential,

    /// The credential was valid once but has expired.
    #[error("credential has expired")]
    Expired,

    /// The credential is malformed or its signature does not verify.
    #[error("invalid credential")]
    Invalid,
}

impl AccessError {
    /// Machine readable code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_token",
            Self::Expired => "token_expired",
            Self::Invalid => "invalid_token",
        }
    }

    /// Human readable message for API responses.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::MissingCredential => "Authorization header with Bearer token is required",
            Self::Expired => "Token has expired",
            Self::Invalid => "Invalid or malformed token",
        }
    }
}

impl From<JwtError> for AccessError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => Self::Expired,
            JwtError::EncodingError(_) | JwtError::DecodingError(_) => Self::Invalid,
        }
    }
}

/// Resolves callers from `Authorization` header values.
#[derive(Debug, Clone)]
pub struct AccessGate {
    jwt: JwtService,
}

impl AccessGate {
    /// Creates a gate that trusts tokens verified by `jwt`.
    #[must_use]
    pub fn new(jwt: JwtService) -> Self {
        Self { jwt }
    }

    /// Resolves the caller behind an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns `AccessError` when the header is missing, is not a bearer credential,
    /// or carries a token that does not validate.
    pub fn resolve_caller(&self, authorization: Option<&str>) -> Result<UserId, AccessError> {
        let token = authorization
            .and_then(extract_bearer_token)
            .ok_or(AccessError::MissingCredential)?;

        let claims = self.jwt.validate_token(token)?;
        Ok(claims.user_id())
    }

    /// Returns the underlying JWT service.
    #[must_use]
    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }
}

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
