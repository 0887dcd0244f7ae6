//! Cadence-adjusted ranking of posts across feeds.
//!
//! Ranking by raw publish date lets a feed that posts ten times a day bury a
//! feed that posts once a month. Instead each post is scored as
//!
//! ```text
//! score = date + cadence(feed)
//! ```
//!
//! where cadence is the average interval between the feed's dated posts. A
//! sparse feed's latest post is pulled forward by its typical gap.
//!
//! - [`cadence`] - per-feed interval estimation
//! - [`order`] - the comparator and the global sort
//!
//! Everything here is synchronous and pure: no I/O, no shared state.

mod cadence;
mod order;

pub use cadence::estimate_cadence;
pub use order::{rank_posts, rank_scored, RankedPost};
