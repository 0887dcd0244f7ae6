//! Unified feed/post model shared by the normalizer, ranking engine and synthesizer.
//!
//! A [`Feed`] owns its [`Post`]s. Each post holds an `Arc` to the feed's
//! [`FeedInfo`], so posts can read their parent's URL and title without
//! copying feed data and without an ownership cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Feed-level metadata, shared read-only between a [`Feed`] and its posts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedInfo {
    /// Display title. Empty when the source omits it.
    pub title: String,
    /// Canonical feed endpoint. Identity key for cadence lookups.
    pub url: String,
    pub description: Option<String>,
    /// Website the feed belongs to (not the feed document itself).
    pub site_link: Option<String>,
    pub last_build_date: Option<DateTime<Utc>>,
}

/// Post fields as produced by the normalizer, before they are attached to a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPost {
    pub title: String,
    pub url: String,
    pub date: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub guid: Option<String>,
    pub creator: Option<String>,
}

/// One syndicated item.
///
/// Posts only come into existence through [`Feed::new`], which guarantees the
/// back-reference points at the feed that owns them.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub title: String,
    pub url: String,
    pub date: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub guid: Option<String>,
    pub creator: Option<String>,
    #[serde(serialize_with = "serialize_feed")]
    feed: Arc<FeedInfo>,
}

fn serialize_feed<S: serde::Serializer>(
    feed: &Arc<FeedInfo>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    FeedInfo::serialize(feed, serializer)
}

impl Post {
    /// Metadata of the feed this post belongs to.
    pub fn feed(&self) -> &FeedInfo {
        &self.feed
    }

    /// URL of the owning feed.
    pub fn feed_url(&self) -> &str {
        &self.feed.url
    }

    /// True when `self` was created by `feed`.
    pub fn belongs_to(&self, feed: &Feed) -> bool {
        Arc::ptr_eq(&self.feed, &feed.info)
    }
}

/// One subscribed source together with its posts, in source order.
///
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct Feed {
    info: Arc<FeedInfo>,
    posts: Vec<Post>,
}

impl Feed {
    pub fn new(info: FeedInfo, posts: impl IntoIterator<Item = ParsedPost>) -> Self {
        let info = Arc::new(info);
        let posts = posts
            .into_iter()
            .map(|p| Post {
                title: p.title,
                url: p.url,
                date: p.date,
                content: p.content,
                guid: p.guid,
                creator: p.creator,
                feed: Arc::clone(&info),
            })
            .collect();
        Self { info, posts }
    }

    pub fn info(&self) -> &FeedInfo {
        &self.info
    }

    pub fn url(&self) -> &str {
        &self.info.url
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(url: &str) -> FeedInfo {
        FeedInfo {
            title: "Blog".to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_posts_point_back_to_owning_feed() {
        let feed = Feed::new(
            info("https://example.com/feed.xml"),
            vec![
                ParsedPost {
                    title: "one".into(),
                    ..Default::default()
                },
                ParsedPost {
                    title: "two".into(),
                    ..Default::default()
                },
            ],
        );

        assert_eq!(feed.posts().len(), 2);
        for post in feed.posts() {
            assert!(post.belongs_to(&feed));
            assert_eq!(post.feed_url(), "https://example.com/feed.xml");
            assert_eq!(post.feed().title, "Blog");
        }
    }

    #[test]
    fn test_same_url_different_feed_is_not_owner() {
        let a = Feed::new(
            info("https://example.com/feed.xml"),
            vec![ParsedPost::default()],
        );
        let b = Feed::new(info("https://example.com/feed.xml"), Vec::new());

        assert!(!a.posts()[0].belongs_to(&b));
    }

    #[test]
    fn test_source_order_preserved() {
        let titles = ["c", "a", "b"];
        let feed = Feed::new(
            info("https://example.com/feed.xml"),
            titles.iter().map(|t| ParsedPost {
                title: t.to_string(),
                ..Default::default()
            }),
        );

        let got: Vec<_> = feed.posts().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(got, titles);
    }
}
