//! Everything between a subscription list and the ranking engine, plus the
//! Atom writer on the other side.
//!
//! - [`opml`] - reads OPML subscription lists into [`FeedSource`]s
//! - [`parser`] - normalizes RSS, Atom and JSON Feed documents into [`Feed`](crate::model::Feed)s
//! - [`fetcher`] - concurrent HTTP retrieval with retries and size limits
//! - [`aggregate`](mod@aggregate) - fetches a whole list and separates failures
//! - [`atom`] - writes a ranked post stream back out as one Atom document
//!
//! # Example
//!
//! ```ignore
//! use feedrank::feed::{aggregate, atom_feed_of_posts, read_opml, AtomOptions, FetchOptions};
//!
//! let list = read_opml(Path::new("subscriptions.opml")).await?;
//! let aggregation = aggregate(&client, list.feeds, &FetchOptions::default()).await;
//! let xml = atom_feed_of_posts(aggregation.ranked(), &AtomOptions::default())?;
//! ```

mod aggregate;
mod atom;
mod fetcher;
mod opml;
mod parser;

pub use aggregate::{aggregate, Aggregation, FeedFailure};
pub use atom::{atom_feed_of_posts, AtomOptions, DEFAULT_FEED_TITLE, FALLBACK_FEED_ID};
pub use fetcher::{fetch_all, fetch_feed, FetchError, FetchOptions, FetchResult};
pub use opml::{parse_opml, read_opml, FeedSource, OpmlError, SubscriptionList};
pub use parser::{parse_feed, ParseError, SourceFormat};
