//! Bearer token middleware.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use secrecy::SecretString;

use super::error::ApiError;
use super::AppState;
use crate::auth::verify_token;

/// Reject requests without a valid `Authorization: Bearer <token>` header.
///
/// When the server runs with auth disabled every request passes through.
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.auth_disabled {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_credentials)
        .filter(|t| !t.is_empty())
        .map(|t| SecretString::from(t.to_string()))
        .ok_or_else(|| {
            tracing::debug!(path = %request.uri().path(), "Request without bearer token");
            ApiError::unauthorized("Missing authorization")
        })?;

    verify_token(&state.db, &token, Utc::now()).await?;

    Ok(next.run(request).await)
}

/// The credentials of a `Bearer` authorization value. The scheme name is
/// case-insensitive.
fn bearer_credentials(value: &str) -> Option<&str> {
    let (scheme, credentials) = value.trim_start().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| credentials.trim())
}
