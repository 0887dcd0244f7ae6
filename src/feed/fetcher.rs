use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;

use crate::config::Config;
use crate::feed::opml::FeedSource;
use crate::feed::parser::parse_feed;
use crate::model::Feed;

/// Errors that can occur while fetching and normalizing one feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    /// Body could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    #[error("Response too large")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Knobs for the fetch layer.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Feeds fetched at the same time.
    pub concurrency: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries for 429, 5xx and truncated bodies.
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry.
    pub retry_base_delay: Duration,
    /// Body size limit in bytes.
    pub max_feed_size: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(2),
            max_feed_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl From<&Config> for FetchOptions {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_feed_size: config.max_feed_size,
        }
    }
}

/// Outcome of fetching one subscription.
#[derive(Debug)]
pub struct FetchResult {
    pub source: FeedSource,
    pub result: Result<Feed, FetchError>,
}

/// Fetches and normalizes every subscription with bounded concurrency.
///
/// Results come back in input order, regardless of which request finished
/// first, so downstream ranking sees feeds in a reproducible order.
///
/// # Returns
///
/// One [`FetchResult`] per source. Failures are returned, not logged; callers
/// decide how to report them.
pub async fn fetch_all(
    client: &reqwest::Client,
    sources: Vec<FeedSource>,
    opts: &FetchOptions,
) -> Vec<FetchResult> {
    if sources.is_empty() {
        return Vec::new();
    }

    let total = sources.len();

    let results: Vec<FetchResult> = stream::iter(sources)
        .map(|source| async move {
            let result = fetch_feed(client, &source, opts).await;
            FetchResult { source, result }
        })
        .buffered(opts.concurrency.max(1))
        .collect()
        .await;

    let failed = results.iter().filter(|r| r.result.is_err()).count();
    tracing::debug!(total = total, failed = failed, "Fetched feeds");

    results
}

/// Fetches one subscription and normalizes the body into a [`Feed`].
///
/// # Behavior
///
/// - Each attempt, headers and body together, is bounded by `opts.timeout`
/// - HTTP 429 and 5xx are retried with exponential backoff up to `opts.max_retries`
/// - Other non-2xx statuses fail immediately
/// - Bodies over `opts.max_feed_size` are rejected; truncated bodies are retried
///
/// # Errors
///
/// - [`FetchError::Timeout`] when an attempt does not finish in time
/// - [`FetchError::RateLimited`] when 429 persists past the retry budget
/// - [`FetchError::HttpStatus`] for other failing statuses
/// - [`FetchError::Parse`] when the body is not a feed
///
/// A feed is only returned once the whole document parsed.
pub async fn fetch_feed(
    client: &reqwest::Client,
    source: &FeedSource,
    opts: &FetchOptions,
) -> Result<Feed, FetchError> {
    let url = source.feed_url.as_str();
    let mut retry_count = 0;

    let bytes = loop {
        let request = fetch_body(client, url, opts.max_feed_size);
        let attempt = tokio::time::timeout(opts.timeout, request)
            .await
            .unwrap_or(Err(FetchError::Timeout));

        let error = match attempt {
            Ok(bytes) => break bytes,
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(FetchError::HttpStatus(429)) if retry_count >= opts.max_retries => {
                return Err(FetchError::RateLimited(opts.max_retries));
            }
            Err(e) if retry_count >= opts.max_retries => return Err(e),
            Err(e) => e,
        };

        let delay = backoff(opts, retry_count);
        tracing::debug!(
            feed = %url,
            error = %error,
            retry = retry_count,
            delay_ms = delay.as_millis() as u64,
            "Retrying feed after delay"
        );
        tokio::time::sleep(delay).await;
        retry_count += 1;
    };

    parse_feed(url, &bytes).map_err(|e| FetchError::Parse(e.to_string()))
}

/// One GET: status check plus size-limited body read.
async fn fetch_body(
    client: &reqwest::Client,
    url: &str,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }
    read_limited_bytes(response, limit).await
}

/// Rate limiting, server errors and truncated bodies are worth another try.
fn is_retryable(error: &FetchError) -> bool {
    match error {
        FetchError::HttpStatus(status) => *status == 429 || (500..600).contains(status),
        FetchError::IncompleteResponse { .. } => true,
        _ => false,
    }
}

/// `base * 2^retry`, saturating.
fn backoff(opts: &FetchOptions, retry: u32) -> Duration {
    opts.retry_base_delay
        .saturating_mul(2u32.saturating_pow(retry))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
