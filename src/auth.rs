//! API token issuance and verification.
//!
//! Tokens are 32 random bytes encoded as URL-safe base64. Only their SHA-256
//! hash reaches the database, so a leaked database does not leak credentials.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::storage::{Database, DatabaseError, StoredToken};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unknown token")]
    UnknownToken,

    #[error("Token expired")]
    Expired,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A token as handed to the user. The plaintext is only available here.
pub struct IssuedToken {
    pub token: SecretString,
    pub record: StoredToken,
}

/// SHA-256 of the bearer value, hex encoded.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

/// Create and store a new token, valid for `valid_for` or forever when `None`.
pub async fn issue_token(
    db: &Database,
    valid_for: Option<Duration>,
) -> Result<IssuedToken, DatabaseError> {
    let token = generate_token();
    let now = Utc::now();
    let valid_until = valid_for.map(|d| now + d);

    let record = db.insert_token(&hash_token(&token), now, valid_until).await?;
    tracing::info!(
        token_id = record.id,
        valid_until = ?record.valid_until,
        "API token issued"
    );

    Ok(IssuedToken {
        token: SecretString::from(token),
        record,
    })
}

/// Check a presented bearer value.
///
/// An expired token is deleted on sight so it cannot be retried.
pub async fn verify_token(
    db: &Database,
    token: &SecretString,
    now: DateTime<Utc>,
) -> Result<StoredToken, AuthError> {
    let record = db
        .find_token(&hash_token(token.expose_secret()))
        .await?
        .ok_or(AuthError::UnknownToken)?;

    if record.is_expired(now) {
        if let Err(e) = db.delete_token(record.id).await {
            tracing::warn!(token_id = record.id, error = %e, "Failed to delete expired token");
        }
        tracing::debug!(token_id = record.id, "Rejected expired token");
        return Err(AuthError::Expired);
    }

    Ok(record)
}
