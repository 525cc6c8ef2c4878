use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

/// Handle to the SQLite database holding subscriptions, articles and tokens.
///
/// Cloning is cheap: all clones share one connection pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// `path` may be `:memory:` for a private in-memory database shared by
    /// every connection of the pool.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Migration` if the schema could not be created,
    /// `DatabaseError::Other` for connection failures.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: a scheduled refresh and an API write may contend
        // for the single SQLite writer; wait instead of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)?
            .foreign_keys(true)
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.migrate()
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        tracing::debug!(path = %path, "Database opened");
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// Every statement uses `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY,
                feed_type TEXT NOT NULL,
                url TEXT UNIQUE NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                thumbnail TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Article identity is the URL *within* a subscription: the same link
        // published by two feeds yields two articles.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                subscription_id INTEGER NOT NULL REFERENCES subscriptions(id),
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                thumbnail TEXT,
                created_at INTEGER NOT NULL,
                is_new INTEGER NOT NULL DEFAULT 1,
                is_read_later INTEGER NOT NULL DEFAULT 0,
                read_later_added_at INTEGER,
                UNIQUE(subscription_id, url),
                CHECK ((is_read_later = 0) = (read_later_added_at IS NULL))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_subscription_created ON articles(subscription_id, created_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        // Partial indexes for the two cross-feed listings
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_unread ON articles(created_at DESC) WHERE is_new = 1",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_read_later ON articles(read_later_added_at DESC) WHERE is_read_later = 1",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_tokens (
                id INTEGER PRIMARY KEY,
                token_hash TEXT UNIQUE NOT NULL,
                created_at INTEGER NOT NULL,
                valid_until INTEGER
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
