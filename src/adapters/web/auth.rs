//! Bearer-token extractor.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use std::sync::Arc;

use crate::domain::user::UserId;

use super::{AppState, WebError};

/// The user a request's bearer token resolves to.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| WebError::unauthorized("missing bearer token"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| WebError::unauthorized("expected a Bearer token"))?;

        state
            .auth
            .resolve(token)
            .map(AuthUser)
            .ok_or_else(|| WebError::unauthorized("unknown token"))
    }
}
