use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use tracing::warn;

use super::{claims::Claims, jwt::JwtKeys};
use crate::error::AppError;

/// Raw token from `Authorization: Bearer <token>`.
pub struct BearerToken(pub String);

/// Caller identified by a valid token.
pub struct AuthUser {
    pub id: i64,
    pub email: String,
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Access token required".into()))?;

    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Access token required".into()))
}

pub(crate) fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<Claims, AppError> {
    let token = bearer_token(headers)?;
    keys.verify(token).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        AppError::InvalidToken("Invalid or expired token".into())
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers).map(|t| BearerToken(t.to_owned()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let claims = authenticate(&parts.headers, &keys)?;
        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
        })
    }
}
