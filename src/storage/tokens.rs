use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{DatabaseError, StoredToken, TokenDbRow};

impl Database {
    // ========================================================================
    // API Tokens
    // ========================================================================

    /// Persist the hash of a freshly issued token.
    pub async fn insert_token(
        &self,
        token_hash: &str,
        created_at: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<StoredToken, DatabaseError> {
        let row = sqlx::query_as::<_, TokenDbRow>(
            r#"
            INSERT INTO auth_tokens (token_hash, created_at, valid_until)
            VALUES (?, ?, ?)
            RETURNING id, token_hash, created_at, valid_until
        "#,
        )
        .bind(token_hash)
        .bind(created_at.timestamp())
        .bind(valid_until.map(|t| t.timestamp()))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_token())
    }

    pub async fn find_token(&self, token_hash: &str) -> Result<Option<StoredToken>, DatabaseError> {
        let row = sqlx::query_as::<_, TokenDbRow>(
            "SELECT id, token_hash, created_at, valid_until FROM auth_tokens WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TokenDbRow::into_token))
    }

    /// Returns `false` when the token was already gone.
    pub async fn delete_token(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
