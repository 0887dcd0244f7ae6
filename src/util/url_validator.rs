use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Reasons a subscription URL is refused.
///
/// Subscription lists come from outside; a URL pointing at the local machine
/// or a private network would turn the fetcher into a proxy (SSRF).
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(IpAddr),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Parses `url_str` and checks it is a public http(s) address.
///
/// Host names other than `localhost` are not resolved; only literal IPs are
/// checked against loopback, private, link-local and unspecified ranges.
/// IPv4-mapped IPv6 literals (`[::ffff:10.0.0.1]`) are checked as IPv4.
///
/// # Arguments
///
/// * `url_str` - Feed URL as found in the subscription list; surrounding
///   whitespace is ignored
///
/// # Returns
///
/// The parsed [`Url`] on success.
///
/// # Errors
///
/// - [`UrlValidationError::InvalidUrl`] if the URL cannot be parsed
/// - [`UrlValidationError::UnsupportedScheme`] for anything but `http`/`https`
/// - [`UrlValidationError::Localhost`] for `localhost` and loopback addresses
/// - [`UrlValidationError::PrivateIp`] for private, link-local and unspecified addresses
///
/// # Examples
///
/// ```
/// use feedrank::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://[::ffff:192.168.1.1]/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }

    match url.host() {
        Some(url::Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            return Err(UrlValidationError::Localhost);
        }
        Some(url::Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip))?,
        Some(url::Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip))?,
        _ => {}
    }

    Ok(url)
}

fn check_ip(ip: IpAddr) -> Result<(), UrlValidationError> {
    // ::ffff:a.b.c.d reaches the IPv4 host a.b.c.d
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        v4 => v4,
    };
    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    let private = match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    };
    if private {
        Err(UrlValidationError::PrivateIp(ip))
    } else {
        Ok(())
    }
}
