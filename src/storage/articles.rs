use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use super::schema::Database;
use super::types::{
    Article, ArticleDbRow, ArticleJoinedRow, ArticleWithSubscription, DatabaseError, NewArticle,
};

const ARTICLE_COLUMNS: &str = "id, subscription_id, url, title, description, thumbnail, \
                               created_at, is_new, is_read_later, read_later_added_at";

impl Database {
    // ========================================================================
    // Article Queries
    // ========================================================================

    /// Every stored article, newest first.
    pub async fn list_articles(&self) -> Result<Vec<Article>, DatabaseError> {
        let rows = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleDbRow::into_article).collect())
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>, DatabaseError> {
        let row = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ArticleDbRow::into_article))
    }

    /// Articles of one subscription ordered by creation time, newest first.
    ///
    /// The refresh engine diffs against this list, so it is unbounded.
    pub async fn get_articles_for_subscription(
        &self,
        subscription_id: i64,
    ) -> Result<Vec<Article>, DatabaseError> {
        let rows = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE subscription_id = ? \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleDbRow::into_article).collect())
    }

    /// Articles still flagged new, across all subscriptions, newest first.
    pub async fn get_unread_articles(&self) -> Result<Vec<ArticleWithSubscription>, DatabaseError> {
        let rows = sqlx::query_as::<_, ArticleJoinedRow>(
            r#"
            SELECT a.id, a.subscription_id, a.url, a.title, a.description, a.thumbnail,
                   a.created_at, a.is_new, a.is_read_later, a.read_later_added_at,
                   s.title AS subscription_title, s.thumbnail AS subscription_thumbnail
            FROM articles a
            JOIN subscriptions s ON s.id = a.subscription_id
            WHERE a.is_new = 1
            ORDER BY a.created_at DESC, a.id DESC
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleJoinedRow::into_joined).collect())
    }

    /// One page of the read-later queue, most recently queued first.
    ///
    /// # Arguments
    ///
    /// * `limit` - Maximum number of rows to return
    /// * `offset` - Number of rows to skip
    pub async fn get_read_later(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ArticleWithSubscription>, DatabaseError> {
        let rows = sqlx::query_as::<_, ArticleJoinedRow>(
            r#"
            SELECT a.id, a.subscription_id, a.url, a.title, a.description, a.thumbnail,
                   a.created_at, a.is_new, a.is_read_later, a.read_later_added_at,
                   s.title AS subscription_title, s.thumbnail AS subscription_thumbnail
            FROM articles a
            JOIN subscriptions s ON s.id = a.subscription_id
            WHERE a.is_read_later = 1
            ORDER BY a.read_later_added_at DESC, a.id DESC
            LIMIT ? OFFSET ?
        "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleJoinedRow::into_joined).collect())
    }

    // ========================================================================
    // Article Inserts
    // ========================================================================

    /// Insert a single article. New articles always start unread and unqueued.
    pub async fn insert_article(&self, article: &NewArticle) -> Result<Article, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let inserted = Self::insert_article_in(&mut tx, article).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    /// Insert a batch of articles atomically, preserving input order.
    ///
    /// If any row fails (typically a `UNIQUE(subscription_id, url)` violation)
    /// the transaction is rolled back on drop and none of the batch is visible.
    pub async fn bulk_insert_articles(
        &self,
        articles: &[NewArticle],
    ) -> Result<Vec<Article>, DatabaseError> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(articles.len());
        for article in articles {
            inserted.push(Self::insert_article_in(&mut tx, article).await?);
        }
        tx.commit().await?;

        Ok(inserted)
    }

    pub(crate) async fn insert_article_in(
        tx: &mut Transaction<'_, Sqlite>,
        article: &NewArticle,
    ) -> Result<Article, DatabaseError> {
        let row = sqlx::query_as::<_, ArticleDbRow>(&format!(
            "INSERT INTO articles (subscription_id, url, title, description, thumbnail, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(article.subscription_id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.thumbnail)
        .bind(article.created_at.timestamp())
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.into_article())
    }

    // ========================================================================
    // Article State
    // ========================================================================

    /// Overwrite the content columns of an article (url, title, description,
    /// thumbnail). Read state is left untouched.
    ///
    /// Returns `false` when no article has `article.id`.
    pub async fn update_article(&self, article: &Article) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE articles SET url = ?, title = ?, description = ?, thumbnail = ? WHERE id = ?",
        )
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.thumbnail)
        .bind(article.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an article read.
    ///
    /// Also drops it from the read-later queue. Idempotent: calling it on an
    /// already-read article succeeds and changes nothing.
    ///
    /// Returns `false` when the article does not exist.
    pub async fn mark_article_read(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE articles SET is_new = 0, is_read_later = 0, read_later_added_at = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Queue an article for later reading.
    ///
    /// Re-queuing keeps the original queue timestamp. Returns `false` when the
    /// article does not exist.
    pub async fn add_to_read_later(&self, id: i64) -> Result<bool, DatabaseError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE articles SET is_read_later = 1, \
             read_later_added_at = COALESCE(read_later_added_at, ?) WHERE id = ?",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove an article from the read-later queue.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotInReadLater`] when the article is missing or
    /// was not queued.
    pub async fn remove_from_read_later(&self, id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE articles SET is_read_later = 0, read_later_added_at = NULL \
             WHERE id = ? AND is_read_later = 1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotInReadLater);
        }
        Ok(())
    }
}
