use super::schema::Database;
use super::types::{Article, DatabaseError, NewArticle, NewSubscription, Subscription};

impl Database {
    // ========================================================================
    // Subscription Queries
    // ========================================================================

    /// Returns every subscription, ordered by id.
    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>, DatabaseError> {
        let subs = sqlx::query_as::<_, Subscription>(
            "SELECT id, feed_type, url, title, description, thumbnail FROM subscriptions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subs)
    }

    pub async fn get_subscription(&self, id: i64) -> Result<Option<Subscription>, DatabaseError> {
        let sub = sqlx::query_as::<_, Subscription>(
            "SELECT id, feed_type, url, title, description, thumbnail FROM subscriptions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sub)
    }

    /// Looks a subscription up by its exact feed URL.
    pub async fn get_subscription_by_url(
        &self,
        url: &str,
    ) -> Result<Option<Subscription>, DatabaseError> {
        let sub = sqlx::query_as::<_, Subscription>(
            "SELECT id, feed_type, url, title, description, thumbnail FROM subscriptions WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sub)
    }

    /// Returns the id of the subscription registered for `url`, if any.
    pub async fn subscription_exists(&self, url: &str) -> Result<Option<i64>, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM subscriptions WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    // ========================================================================
    // Subscription Mutations
    // ========================================================================

    /// Insert a subscription and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation (see [`DatabaseError::is_unique_violation`])
    /// when the URL is already subscribed.
    pub async fn insert_subscription(
        &self,
        new: &NewSubscription,
    ) -> Result<Subscription, DatabaseError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO subscriptions (feed_type, url, title, description, thumbnail)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&new.feed_type)
        .bind(&new.url)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.thumbnail)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(subscription_id = id, url = %new.url, "Subscription added");
        Ok(subscription_from_new(id, new))
    }

    /// Overwrite every mutable column of an existing subscription.
    ///
    /// Returns `false` when no subscription has `sub.id`.
    pub async fn update_subscription(&self, sub: &Subscription) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET feed_type = ?, url = ?, title = ?, description = ?, thumbnail = ?
            WHERE id = ?
        "#,
        )
        .bind(&sub.feed_type)
        .bind(&sub.url)
        .bind(&sub.title)
        .bind(&sub.description)
        .bind(&sub.thumbnail)
        .bind(sub.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Create a subscription together with its initial articles.
    ///
    /// Both writes share one transaction: either the subscription exists with
    /// all of `articles`, or nothing was written. The `subscription_id` of each
    /// article is ignored and replaced with the new subscription's id.
    pub async fn create_subscription_with_articles(
        &self,
        new: &NewSubscription,
        articles: &[NewArticle],
    ) -> Result<(Subscription, Vec<Article>), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO subscriptions (feed_type, url, title, description, thumbnail)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&new.feed_type)
        .bind(&new.url)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.thumbnail)
        .fetch_one(&mut *tx)
        .await?;

        let mut inserted = Vec::with_capacity(articles.len());
        for article in articles {
            let article = NewArticle {
                subscription_id: id,
                ..article.clone()
            };
            inserted.push(Self::insert_article_in(&mut tx, &article).await?);
        }

        tx.commit().await?;

        tracing::info!(
            subscription_id = id,
            url = %new.url,
            articles = inserted.len(),
            "Subscription created"
        );
        Ok((subscription_from_new(id, new), inserted))
    }
}

fn subscription_from_new(id: i64, new: &NewSubscription) -> Subscription {
    Subscription {
        id,
        feed_type: new.feed_type.clone(),
        url: new.url.clone(),
        title: new.title.clone(),
        description: new.description.clone(),
        thumbnail: new.thumbnail.clone(),
    }
}
