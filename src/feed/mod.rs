//! Feed retrieval and reconciliation.
//!
//! - [`parser`] - turns RSS/Atom/JSON Feed bytes into a [`RemoteFeed`] using `feed-rs`
//! - [`fetcher`] - HTTP retrieval with retries and size limits ([`HttpFeedSource`])
//! - [`refresh`] - the reconciliation engine that diffs live feeds against the
//!   article store and inserts only unseen articles ([`Refresher`])
//!
//! # Example
//!
//! ```ignore
//! use feedbox::feed::{HttpFeedSource, Refresher};
//!
//! let refresher = Refresher::new(db, HttpFeedSource::new(reqwest::Client::new()));
//! let report = refresher.refresh_all().await?;
//! println!("{} new articles", report.new_articles.len());
//! ```

mod fetcher;
mod parser;
mod refresh;

use std::future::Future;

pub use fetcher::{FetchError, HttpFeedSource};
pub use parser::{parse_feed, ParseResult, RemoteFeed, RemoteItem};
pub use refresh::{
    candidates_from_items, created_at_for, select_new, FeedFailure, RefreshError, RefreshPolicy,
    RefreshReport, Refresher,
};

/// Somewhere feeds can be fetched from.
///
/// Implementations must report a missing feed as [`FetchError::NotFound`].
pub trait FeedSource: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<RemoteFeed, FetchError>> + Send;
}
