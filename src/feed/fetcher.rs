use crate::config::Config;
use crate::feed::parser::{parse_feed, ParseResult, RemoteFeed};
use crate::feed::FeedSource;
use futures::TryStreamExt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(2);

/// Errors that can occur while fetching and parsing a remote feed.
///
/// [`FetchError::NotFound`] is kept apart from every other failure so callers
/// can report a bad feed URL as a client error.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The remote answered 404 Not Found
    #[error("Feed not found")]
    NotFound,
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with a non-2xx status other than 404
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded its time budget
    #[error("Request timed out")]
    Timeout,
    /// Body could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound)
    }
}

/// [`FeedSource`] backed by `reqwest` and `feed-rs`.
///
/// Transient failures (5xx, 429, truncated bodies) are retried with
/// exponential backoff; every other status fails immediately.
#[derive(Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    request_timeout: Duration,
    max_retries: u32,
    retry_base: Duration,
    max_bytes: usize,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base: DEFAULT_RETRY_BASE,
            max_bytes: DEFAULT_MAX_FEED_SIZE,
        }
    }

    /// Build a client and source from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self::new(client)
            .with_request_timeout(config.fetch_timeout())
            .with_max_retries(config.max_retries)
            .with_max_bytes(config.max_feed_bytes))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// First backoff delay; each further retry doubles it.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            let response =
                tokio::time::timeout(self.request_timeout, self.client.get(url).send())
                    .await
                    .map_err(|_| FetchError::Timeout)?
                    .map_err(FetchError::Network)?;

            let status = response.status();

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }

                let delay = self.backoff(retry_count);
                tracing::warn!(
                    feed = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Transient HTTP error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            match read_limited_bytes(response, self.max_bytes).await {
                Ok(bytes) => return Ok(bytes),
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    if retry_count >= self.max_retries {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }

                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        feed = %url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        self.retry_base.saturating_mul(2u32.saturating_pow(retry_count))
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<RemoteFeed, FetchError> {
        let bytes = self.fetch_bytes(url).await?;

        let ParseResult { feed, skipped } =
            parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

        if skipped > 0 {
            tracing::warn!(feed = %url, skipped = skipped, "Feed items without a link skipped");
        }
        tracing::debug!(feed = %url, items = feed.items.len(), "Feed fetched");

        Ok(feed)
    }
}

/// Collect the body, refusing anything past `limit` bytes.
///
/// A body shorter than its declared `Content-Length` is reported as
/// [`FetchError::IncompleteResponse`] so the caller can retry it.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let declared = response.content_length();
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(FetchError::ResponseTooLarge);
    }

    let mut body = Vec::with_capacity(declared.map_or(0, |len| len as usize));
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.try_next().await? {
        if body.len() + chunk.len() > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    match declared {
        Some(expected) if (body.len() as u64) < expected => Err(FetchError::IncompleteResponse {
            expected,
            received: body.len(),
        }),
        _ => Ok(body),
    }
}
