use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur during URL validation.
///
/// These cover both parsing failures and the policy that keeps the server
/// from being pointed at hosts on its own network (SSRF).
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL string for use as a feed source.
///
/// Always rejects non-HTTP(S) schemes. Unless `allow_private` is set, also
/// rejects:
/// - Localhost addresses (`localhost`, `127.0.0.1`, `::1`)
/// - Private IP ranges (RFC 1918, link-local, unique local IPv6)
///
/// # Returns
///
/// The parsed [`Url`] on success. Its string form is what gets stored as the
/// subscription URL.
///
/// # Examples
///
/// ```
/// use feedbox::util::validate_feed_url;
///
/// let url = validate_feed_url("https://example.com/feed.xml", false).unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_feed_url("http://192.168.1.1/feed", false).is_err());
/// assert!(validate_feed_url("http://192.168.1.1/feed", true).is_ok());
/// assert!(validate_feed_url("file:///etc/passwd", true).is_err());
/// ```
pub fn validate_feed_url(url_str: &str, allow_private: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if !allow_private {
        check_public_host(&url)?;
    }
    Ok(url)
}

fn check_public_host(url: &Url) -> Result<(), UrlValidationError> {
    let ip = match url.host() {
        Some(Host::Domain(name)) if name.eq_ignore_ascii_case("localhost") => {
            return Err(UrlValidationError::Localhost)
        }
        Some(Host::Ipv4(v4)) => IpAddr::V4(v4),
        // ::ffff:a.b.c.d reaches the IPv4 host
        Some(Host::Ipv6(v6)) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        _ => return Ok(()),
    };

    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    if is_internal(&ip) {
        return Err(UrlValidationError::PrivateIp(ip.to_string()));
    }
    Ok(())
}

fn is_internal(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link-local
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}
