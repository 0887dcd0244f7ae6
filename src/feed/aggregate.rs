use crate::feed::fetcher::{fetch_all, FetchError, FetchOptions};
use crate::feed::opml::FeedSource;
use crate::model::{Feed, Post};
use crate::rank::rank_posts;

/// A subscription that produced no feed this run.
#[derive(Debug)]
pub struct FeedFailure {
    pub source: FeedSource,
    pub error: FetchError,
}

/// Outcome of fetching a whole subscription list.
///
/// `feeds` only ever holds fully parsed feeds, in subscription order.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub feeds: Vec<Feed>,
    pub failures: Vec<FeedFailure>,
}

impl Aggregation {
    /// Posts of every collected feed in cadence-adjusted order.
    pub fn ranked(&self) -> Vec<&Post> {
        rank_posts(&self.feeds)
    }

    pub fn post_count(&self) -> usize {
        self.feeds.iter().map(|f| f.posts().len()).sum()
    }

    /// True when there were sources but none of them could be fetched.
    pub fn all_failed(&self) -> bool {
        self.feeds.is_empty() && !self.failures.is_empty()
    }
}

/// Fetches and normalizes every source, splitting successes from failures.
///
/// # Arguments
///
/// * `client` - Shared HTTP client (user agent, TLS, DNS)
/// * `sources` - Subscriptions in the order their feeds should be ranked
/// * `opts` - Concurrency, timeout, retry and size limits
///
/// # Returns
///
/// An [`Aggregation`]. Each failing feed is logged once at `warn` and kept in
/// [`Aggregation::failures`]; no failure aborts the run.
pub async fn aggregate(
    client: &reqwest::Client,
    sources: Vec<FeedSource>,
    opts: &FetchOptions,
) -> Aggregation {
    let mut aggregation = Aggregation::default();

    for fetched in fetch_all(client, sources, opts).await {
        match fetched.result {
            Ok(feed) => {
                tracing::debug!(feed = %feed.url(), posts = feed.posts().len(), "Feed collected");
                aggregation.feeds.push(feed);
            }
            Err(error) => {
                tracing::warn!(feed = %fetched.source.feed_url, error = %error, "Feed excluded");
                aggregation.failures.push(FeedFailure {
                    source: fetched.source,
                    error,
                });
            }
        }
    }

    tracing::info!(
        feeds = aggregation.feeds.len(),
        failed = aggregation.failures.len(),
        posts = aggregation.post_count(),
        "Aggregation complete"
    );
    aggregation
}
