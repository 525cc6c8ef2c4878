//! Configuration file parser for `feedbox.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos. Command-line flags are applied on top by `main`.
use serde::Deserialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::RefreshPolicy;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but is unusable.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Server configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub listen: String,

    /// Path of the SQLite database file.
    pub database: String,

    /// Serve every route without a bearer token. Local development only.
    pub disable_auth: bool,

    /// Seconds between background refresh passes. 0 = manual refresh only.
    pub refresh_interval_secs: u64,

    /// Upper bound on fetching one feed, retries included.
    pub fetch_timeout_secs: u64,

    /// Retries for transient fetch failures (5xx, 429, truncated bodies).
    pub max_retries: u32,

    /// Largest feed body accepted, in bytes.
    pub max_feed_bytes: usize,

    /// What a refresh pass does when one feed fails.
    pub on_feed_error: RefreshPolicy,

    /// Allow subscribing to loopback and private-network hosts.
    pub allow_private_feeds: bool,

    /// User-Agent header sent with feed requests.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "[::1]:8080".to_string(),
            database: "database.sqlite".to_string(),
            disable_auth: false,
            refresh_interval_secs: 30 * 60,
            fetch_timeout_secs: 30,
            max_retries: 2,
            max_feed_bytes: 10 * 1024 * 1024,
            on_feed_error: RefreshPolicy::Isolate,
            allow_private_feeds: false,
            user_agent: concat!("feedbox/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "listen",
        "database",
        "disable_auth",
        "refresh_interval_secs",
        "fetch_timeout_secs",
        "max_retries",
        "max_feed_bytes",
        "on_feed_error",
        "allow_private_feeds",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or blank file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Zero `fetch_timeout_secs` → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = Self::read_capped(path)? else {
            tracing::debug!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        };
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(table) = content.parse::<toml::Table>() {
            table
                .keys()
                .filter(|key| !Self::KNOWN_KEYS.contains(&key.as_str()))
                .for_each(|key| tracing::warn!(key = %key, "Unknown key in config file, ignoring"));
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), listen = %config.listen, "Loaded configuration");
        Ok(config)
    }

    /// Read at most `MAX_FILE_SIZE` bytes; `None` when the file does not exist.
    fn read_capped(path: &Path) -> Result<Option<String>, ConfigError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut content = String::new();
        file.take(Self::MAX_FILE_SIZE + 1)
            .read_to_string(&mut content)?;
        if content.len() as u64 > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "{} exceeds {} bytes",
                path.display(),
                Self::MAX_FILE_SIZE
            )));
        }
        Ok(Some(content))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// `None` when background refresh is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

// ============================================================================
// Tests
// ============================================================================
