use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::AppState;

/// Compare a presented secret with the expected one.
///
/// Both sides are hashed first so the comparison time does not depend on how
/// many leading bytes match.
#[must_use]
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Request carrying `Authorization: Bearer {ADMIN_SECRET}`.
/// Returns 403 Forbidden otherwise, including when no secret is configured.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let forbidden = || (StatusCode::FORBIDDEN, "Forbidden").into_response();

        let Some(expected) = state.config.admin_secret.as_deref() else {
            warn!("Admin endpoint called but ADMIN_SECRET is not set");
            return Err(forbidden());
        };

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim);

        match token {
            Some(token) if secrets_match(token, expected) => Ok(RequireAdmin),
            _ => Err(forbidden()),
        }
    }
}
