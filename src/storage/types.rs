use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The article exists but is not queued for later reading
    #[error("Article is not in the read-later queue")]
    NotInReadLater,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// True when the underlying SQLite error is a UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Other(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

/// Converts stored Unix seconds back into a UTC timestamp.
///
/// Out-of-range values collapse to the epoch rather than failing the whole row.
pub(crate) fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

// ============================================================================
// Subscriptions
// ============================================================================

/// A registered feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    /// Wire format reported by the parser ("rss", "atom", "json").
    pub feed_type: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    /// Image URL advertised by the feed itself, if any.
    pub thumbnail: Option<String>,
}

/// Subscription data prior to insertion (no id yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub feed_type: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

/// The parts of a subscription embedded in cross-feed article listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionSummary {
    pub id: i64,
    pub title: String,
    pub thumbnail: Option<String>,
}

// ============================================================================
// Articles
// ============================================================================

/// Article candidate produced from a feed item, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub subscription_id: i64,
    /// Identity of the article within its subscription (compared verbatim).
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Article as stored.
///
/// `read_later_added_at` is `Some` exactly when `is_read_later` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: i64,
    pub subscription_id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_new: bool,
    pub is_read_later: bool,
    pub read_later_added_at: Option<DateTime<Utc>>,
}

/// Article joined with the subscription it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleWithSubscription {
    #[serde(flatten)]
    pub article: Article,
    pub subscription: SubscriptionSummary,
}

/// Internal row type for Article queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleDbRow {
    pub id: i64,
    pub subscription_id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub created_at: i64,
    pub is_new: bool,
    pub is_read_later: bool,
    pub read_later_added_at: Option<i64>,
}

impl ArticleDbRow {
    pub(crate) fn into_article(self) -> Article {
        Article {
            id: self.id,
            subscription_id: self.subscription_id,
            url: self.url,
            title: self.title,
            description: self.description,
            thumbnail: self.thumbnail,
            created_at: from_unix(self.created_at),
            is_new: self.is_new,
            is_read_later: self.is_read_later,
            read_later_added_at: self.read_later_added_at.map(from_unix),
        }
    }
}

/// Article row joined with its subscription's title and thumbnail
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleJoinedRow {
    #[sqlx(flatten)]
    pub article: ArticleDbRow,
    pub subscription_title: String,
    pub subscription_thumbnail: Option<String>,
}

impl ArticleJoinedRow {
    pub(crate) fn into_joined(self) -> ArticleWithSubscription {
        let subscription = SubscriptionSummary {
            id: self.article.subscription_id,
            title: self.subscription_title,
            thumbnail: self.subscription_thumbnail,
        };
        ArticleWithSubscription {
            article: self.article.into_article(),
            subscription,
        }
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// A stored API token. Only the hash of the bearer value is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub id: i64,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// A token without `valid_until` never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until < now)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TokenDbRow {
    pub id: i64,
    pub token_hash: String,
    pub created_at: i64,
    pub valid_until: Option<i64>,
}

impl TokenDbRow {
    pub(crate) fn into_token(self) -> StoredToken {
        StoredToken {
            id: self.id,
            token_hash: self.token_hash,
            created_at: from_unix(self.created_at),
            valid_until: self.valid_until.map(from_unix),
        }
    }
}
