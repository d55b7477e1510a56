//! Party identity for payment endpoints.
//!
//! Authentication itself happens upstream (out of scope here); the edge
//! gateway injects the verified user id as the `X-User-Id` header. The
//! coordinator only needs to know which party is calling.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use uuid::Uuid;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing user identity".to_string()))?;

        let user_id = raw
            .parse::<Uuid>()
            .map_err(|_| AppError::Unauthorized("malformed user identity".to_string()))?;

        Ok(AuthenticatedUser(user_id))
    }
}
