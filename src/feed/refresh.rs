use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use crate::feed::fetcher::{FetchError, HttpFeedSource};
use crate::feed::parser::{RemoteFeed, RemoteItem};
use crate::feed::FeedSource;
use crate::storage::{Article, Database, DatabaseError, NewArticle, Subscription};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// What a pass does when one subscription's feed cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Record the failure in the report and move on to the next subscription.
    #[default]
    Isolate,
    /// Abort the pass with the fetch error.
    FailFast,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Failed to refresh subscription {subscription_id} ({url}): {source}")]
    Fetch {
        subscription_id: i64,
        url: String,
        source: FetchError,
    },
}

/// A subscription skipped during a pass under [`RefreshPolicy::Isolate`].
#[derive(Debug)]
pub struct FeedFailure {
    pub subscription_id: i64,
    pub url: String,
    pub error: FetchError,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Articles inserted by this pass, in feed order per subscription.
    pub new_articles: Vec<Article>,
    pub failures: Vec<FeedFailure>,
}

/// Keeps the article store in step with every subscribed feed.
///
/// All passes, manual or scheduled, run one at a time: a manual
/// [`refresh_all`](Self::refresh_all) waits for an in-flight pass and then
/// diffs against what that pass committed, so nothing is inserted twice.
pub struct Refresher<S = HttpFeedSource> {
    db: Database,
    source: S,
    fetch_timeout: Duration,
    policy: RefreshPolicy,
    pass_lock: Mutex<()>,
}

impl<S: FeedSource> Refresher<S> {
    pub fn new(db: Database, source: S) -> Self {
        Self {
            db,
            source,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            policy: RefreshPolicy::default(),
            pass_lock: Mutex::new(()),
        }
    }

    /// Upper bound on a single feed fetch, retries included.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch one feed outside of a pass, under the same timeout.
    pub async fn fetch_feed(&self, url: &str) -> Result<RemoteFeed, FetchError> {
        tokio::time::timeout(self.fetch_timeout, self.source.fetch(url))
            .await
            .map_err(|_| FetchError::Timeout)?
    }

    /// Fetch every subscription and insert the articles not seen before.
    ///
    /// # Errors
    ///
    /// Store failures always abort the pass. Fetch failures abort it only under
    /// [`RefreshPolicy::FailFast`]. Articles committed for subscriptions
    /// processed before the error stay committed.
    pub async fn refresh_all(&self) -> Result<RefreshReport, RefreshError> {
        let _guard = self.pass_lock.lock().await;
        self.pass().await
    }

    /// Run a pass every `period`, forever.
    ///
    /// The first pass happens one period after the call. Errors are logged and
    /// the schedule continues; a tick that finds a pass in flight is skipped.
    pub async fn run(&self, period: Duration) {
        tracing::info!(interval_secs = period.as_secs(), "Refresh scheduler started");

        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            self.scheduled_pass().await;
        }
    }

    /// One scheduler tick. Returns `None` when skipped or failed.
    async fn scheduled_pass(&self) -> Option<RefreshReport> {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            tracing::debug!("Refresh already in progress, skipping scheduled run");
            return None;
        };

        match self.pass().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Scheduled refresh failed");
                None
            }
        }
    }

    async fn pass(&self) -> Result<RefreshReport, RefreshError> {
        let started = std::time::Instant::now();
        let subscriptions = self.db.list_subscriptions().await?;
        let mut report = RefreshReport::default();

        for sub in &subscriptions {
            match self.refresh_subscription(sub).await {
                Ok(inserted) => report.new_articles.extend(inserted),
                Err(RefreshError::Fetch {
                    subscription_id,
                    url,
                    source,
                }) if self.policy == RefreshPolicy::Isolate => {
                    tracing::warn!(
                        subscription_id = subscription_id,
                        feed = %url,
                        error = %source,
                        "Feed refresh failed, skipping"
                    );
                    report.failures.push(FeedFailure {
                        subscription_id,
                        url,
                        error: source,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            subscriptions = subscriptions.len(),
            new_articles = report.new_articles.len(),
            failures = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Refresh pass complete"
        );
        Ok(report)
    }

    async fn refresh_subscription(&self, sub: &Subscription) -> Result<Vec<Article>, RefreshError> {
        let existing = self.db.get_articles_for_subscription(sub.id).await?;

        let fetch_error = |source: FetchError| RefreshError::Fetch {
            subscription_id: sub.id,
            url: sub.url.clone(),
            source,
        };
        let feed = self.fetch_feed(&sub.url).await.map_err(fetch_error)?;

        let candidates = candidates_from_items(sub.id, feed.items, Utc::now());
        let fresh = select_new(&existing, candidates);
        if fresh.is_empty() {
            tracing::debug!(subscription_id = sub.id, "No new articles");
            return Ok(Vec::new());
        }

        let inserted = self.db.bulk_insert_articles(&fresh).await?;
        tracing::info!(
            subscription_id = sub.id,
            new_articles = inserted.len(),
            "Subscription refreshed"
        );
        Ok(inserted)
    }
}

/// Convert fetched items into unsaved articles for `subscription_id`.
pub fn candidates_from_items(
    subscription_id: i64,
    items: Vec<RemoteItem>,
    fetched_at: DateTime<Utc>,
) -> Vec<NewArticle> {
    items
        .into_iter()
        .map(|item| NewArticle {
            subscription_id,
            created_at: created_at_for(&item, fetched_at),
            url: item.url,
            title: item.title,
            description: item.description,
            thumbnail: item.image_url,
        })
        .collect()
}

/// The item's published date, or `fetched_at` when the feed gave none.
pub fn created_at_for(item: &RemoteItem, fetched_at: DateTime<Utc>) -> DateTime<Utc> {
    match item.published_at {
        Some(published) => published,
        None => {
            tracing::debug!(
                url = %item.url,
                fetched_at = %fetched_at,
                "Item has no publish date, using fetch time"
            );
            fetched_at
        }
    }
}

/// Keep the candidates whose URL is not already stored.
///
/// URLs are compared as exact strings. When a feed repeats a URL, only the
/// first occurrence is kept. Order is preserved.
pub fn select_new(existing: &[Article], candidates: Vec<NewArticle>) -> Vec<NewArticle> {
    let mut seen: HashSet<String> = existing.iter().map(|a| a.url.clone()).collect();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect()
}
