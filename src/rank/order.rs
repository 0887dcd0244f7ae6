use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::cadence::estimate_cadence;
use crate::model::{Feed, Post};

/// A post together with the score it was ranked by.
#[derive(Debug, Clone, Serialize)]
pub struct RankedPost<'a> {
    #[serde(flatten)]
    pub post: &'a Post,
    /// `date + cadence`. `None` for posts without a date.
    pub score: Option<DateTime<Utc>>,
}

/// Orders every post of every feed into one stream.
///
/// See [`rank_scored`] for the ordering rules.
///
/// # Arguments
///
/// * `feeds` - Fully normalized feeds. Slice order breaks ties.
///
/// # Returns
///
/// Borrowed posts, one per input post, highest score first. Never fails and
/// never drops a post; empty input gives an empty vector.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use feedrank::model::{Feed, FeedInfo, ParsedPost};
/// use feedrank::rank::rank_posts;
///
/// let post = |title: &str, day: u32| ParsedPost {
///     title: title.to_string(),
///     date: Some(Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()),
///     ..Default::default()
/// };
/// let info = |url: &str| FeedInfo {
///     url: url.to_string(),
///     ..Default::default()
/// };
///
/// // Posts every two days; its newest post scores Jan 7
/// let busy = Feed::new(info("busy"), [post("b1", 1), post("b3", 3), post("b5", 5)]);
/// // A single post has no cadence and scores its own date
/// let quiet = Feed::new(info("quiet"), [post("q4", 4)]);
///
/// let feeds = [busy, quiet];
/// let titles: Vec<_> = rank_posts(&feeds).iter().map(|p| p.title.as_str()).collect();
/// assert_eq!(titles, ["b5", "b3", "q4", "b1"]);
/// ```
pub fn rank_posts(feeds: &[Feed]) -> Vec<&Post> {
    rank_scored(feeds).into_iter().map(|r| r.post).collect()
}

/// Orders every post of every feed, keeping the score each post was sorted by.
///
/// - Posts without a date come first, in input order.
/// - Dated posts follow, latest `date + cadence` first, where cadence is the
///   average posting interval of the post's feed (zero when unknown).
/// - Ties keep input order (feeds in slice order, posts in source order).
///
/// Dateless-first is a deliberate default: an undated post is treated as
/// unranked rather than dropped or pushed to the end.
pub fn rank_scored(feeds: &[Feed]) -> Vec<RankedPost<'_>> {
    let cadences = cadence_table(feeds);

    let mut ranked: Vec<RankedPost<'_>> = feeds
        .iter()
        .flat_map(Feed::posts)
        .map(|post| {
            let cadence = lookup_cadence(&cadences, post);
            RankedPost {
                post,
                score: post.date.map(|d| score(d, cadence)),
            }
        })
        .collect();

    // slice::sort_by is stable; ties keep flattening order
    ranked.sort_by(|a, b| compare_scores(a.score, b.score));

    tracing::debug!(
        feeds = feeds.len(),
        posts = ranked.len(),
        "Ranked posts"
    );

    ranked
}

/// Cadence per distinct feed URL, computed once per URL.
fn cadence_table(feeds: &[Feed]) -> HashMap<&str, Option<TimeDelta>> {
    let mut table: HashMap<&str, Option<TimeDelta>> = HashMap::with_capacity(feeds.len());
    for feed in feeds {
        if table.contains_key(feed.url()) {
            // Two feeds claiming one URL: first one's cadence wins, posts are not merged.
            tracing::warn!(
                feed = %feed.url(),
                "Duplicate feed URL in ranking input, reusing first feed's cadence"
            );
            continue;
        }
        table.insert(feed.url(), estimate_cadence(feed));
    }
    table
}

fn lookup_cadence(table: &HashMap<&str, Option<TimeDelta>>, post: &Post) -> TimeDelta {
    let entry = table.get(post.feed_url());
    debug_assert!(
        entry.is_some(),
        "post references unregistered feed {}",
        post.feed_url()
    );
    entry.copied().flatten().unwrap_or_else(TimeDelta::zero)
}

fn score(date: DateTime<Utc>, cadence: TimeDelta) -> DateTime<Utc> {
    date.checked_add_signed(cadence).unwrap_or(if cadence < TimeDelta::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Dateless before dated; among dated, later score first.
fn compare_scores(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => b.cmp(&a),
    }
}
