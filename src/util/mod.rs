//! Utility functions for common operations.
//!
//! - **URL validation**: feed URL checks that keep the server from fetching
//!   its own network (SSRF)

mod url_validator;

pub use url_validator::{validate_feed_url, UrlValidationError};
