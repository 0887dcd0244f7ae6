use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed as RawFeed, FeedType, Link};
use feed_rs::parser::{self, ParseFeedError};
use thiserror::Error;

use crate::model::{Feed, FeedInfo, ParsedPost};
use crate::util::{non_empty, xml_safe_text};

#[derive(Debug, Error)]
pub enum ParseError {
    /// Document is not RSS, Atom or JSON Feed, or is malformed.
    #[error("Parse error: {0}")]
    Feed(#[from] ParseFeedError),
}

/// Syndication format of a source document.
///
/// Decided once per document; each variant knows where its format keeps the
/// fields the post model needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// RSS 0.9x, 1.0 and 2.0
    Rss,
    Atom,
    Json,
}

impl From<&FeedType> for SourceFormat {
    fn from(kind: &FeedType) -> Self {
        match kind {
            FeedType::Atom => Self::Atom,
            FeedType::JSON => Self::Json,
            FeedType::RSS0 | FeedType::RSS1 | FeedType::RSS2 => Self::Rss,
        }
    }
}

impl SourceFormat {
    /// Post body.
    ///
    /// RSS readers treat `<description>` as the item content and
    /// `content:encoded` as an alternative; Atom separates `<summary>` from
    /// `<content>` and only the latter is content.
    fn content(self, entry: &Entry) -> Option<String> {
        let body = entry.content.as_ref().and_then(|c| c.body.clone());
        let summary = entry.summary.as_ref().map(|s| s.content.clone());
        match self {
            Self::Rss => summary.or(body),
            Self::Atom => body,
            Self::Json => body.or(summary),
        }
    }

    /// Feed-level "last built" timestamp.
    ///
    /// RSS has `lastBuildDate` (mapped to `updated`) and falls back to the
    /// channel `pubDate`; Atom and JSON Feed only carry `updated`.
    fn build_date(self, raw: &RawFeed) -> Option<DateTime<Utc>> {
        match self {
            Self::Rss => raw.updated.or(raw.published),
            Self::Atom | Self::Json => raw.updated,
        }
    }
}

/// Normalizes one fetched feed document into a [`Feed`].
///
/// `url` is the endpoint the document was fetched from and becomes the feed's
/// identity, whatever self-link the document advertises.
///
/// Per post:
/// - `date` is the published date, else the updated date, else `None`
/// - `guid` is set only when the source supplied an id
/// - `url` is the first alternate link, empty when the item has none
///
/// Characters illegal in XML are stripped from text fields.
pub fn parse_feed(url: &str, bytes: &[u8]) -> Result<Feed, ParseError> {
    // Empty ids mark entries whose source had no guid/id of its own.
    let raw = parser::Builder::new()
        .id_generator(|_links, _title, _uri| String::new())
        .build()
        .parse(bytes)?;

    let format = SourceFormat::from(&raw.feed_type);

    let posts: Vec<ParsedPost> = raw
        .entries
        .iter()
        .map(|entry| normalize_entry(format, entry))
        .collect();

    let info = FeedInfo {
        title: raw
            .title
            .as_ref()
            .map(|t| clean(&t.content))
            .unwrap_or_default(),
        url: url.to_string(),
        description: raw
            .description
            .as_ref()
            .and_then(|d| non_empty(clean(&d.content))),
        site_link: site_link(&raw.links, url),
        last_build_date: format.build_date(&raw),
    };

    tracing::debug!(
        feed = %url,
        format = ?format,
        posts = posts.len(),
        "Normalized feed"
    );

    Ok(Feed::new(info, posts))
}

fn normalize_entry(format: SourceFormat, entry: &Entry) -> ParsedPost {
    ParsedPost {
        title: entry
            .title
            .as_ref()
            .map(|t| clean(&t.content))
            .unwrap_or_default(),
        url: post_link(&entry.links).unwrap_or_default(),
        date: entry.published.or(entry.updated),
        content: format.content(entry).and_then(|c| non_empty(clean(&c))),
        guid: non_empty(&entry.id),
        creator: entry
            .authors
            .iter()
            .find_map(|a| non_empty(clean(&a.name))),
    }
}

fn clean(s: &str) -> String {
    xml_safe_text(s).into_owned()
}

fn is_rel(link: &Link, rel: &str) -> bool {
    link.rel.as_deref().is_some_and(|r| r.eq_ignore_ascii_case(rel))
}

/// First alternate (or untyped) link of an entry, else its first link.
fn post_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.is_none() || is_rel(l, "alternate"))
        .or_else(|| links.first())
        .and_then(|l| non_empty(&l.href))
}

/// The website link of a feed: first link that is neither `rel="self"` nor the
/// feed document itself.
fn site_link(links: &[Link], feed_url: &str) -> Option<String> {
    links
        .iter()
        .filter(|l| !is_rel(l, "self") && l.href != feed_url)
        .find_map(|l| non_empty(&l.href))
}
