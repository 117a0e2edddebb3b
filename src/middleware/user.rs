//! Authenticated user extractor
//!
//! Authentication itself happens in front of this service. The auth layer
//! forwards the user as an opaque id in the `x-user-id` header; requests
//! without it are rejected with 401.

use crate::error::AppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Opaque id of the authenticated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match user {
            Some(id) => Ok(Self(id.to_string())),
            None => {
                tracing::debug!(uri = %parts.uri, "Request without authenticated user");
                Err(AppError::Unauthorized)
            }
        }
    }
}
