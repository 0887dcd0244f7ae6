use chrono::TimeDelta;

use crate::model::Feed;

/// Average interval between a feed's dated posts, in millisecond resolution.
///
/// Returns `None` when fewer than two posts carry a date. That is not the same
/// as a zero interval: callers decide how to treat an unknown cadence.
pub fn estimate_cadence(feed: &Feed) -> Option<TimeDelta> {
    let mut dates: Vec<i64> = feed
        .posts()
        .iter()
        .filter_map(|p| p.date.map(|d| d.timestamp_millis()))
        .collect();

    if dates.len() < 2 {
        return None;
    }

    dates.sort_unstable();

    let intervals = dates.windows(2).map(|w| i128::from(w[1] - w[0]));
    let count = (dates.len() - 1) as i128;
    let mean = intervals.sum::<i128>() / count;

    // Mean of intervals between i64 millisecond timestamps always fits back in i64.
    TimeDelta::try_milliseconds(mean as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeedInfo, ParsedPost};
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap()
    }

    fn feed_with_dates(dates: &[Option<DateTime<Utc>>]) -> Feed {
        Feed::new(
            FeedInfo {
                url: "https://example.com/feed.xml".into(),
                ..Default::default()
            },
            dates.iter().map(|d| ParsedPost {
                date: *d,
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_empty_feed_has_no_cadence() {
        assert_eq!(estimate_cadence(&feed_with_dates(&[])), None);
    }

    #[test]
    fn test_single_dated_post_has_no_cadence() {
        let feed = feed_with_dates(&[Some(day(1)), None, None]);
        assert_eq!(estimate_cadence(&feed), None);
    }

    #[test]
    fn test_two_posts_yield_their_difference() {
        let feed = feed_with_dates(&[Some(day(4)), Some(day(1))]);
        assert_eq!(estimate_cadence(&feed), Some(TimeDelta::days(3)));
    }

    #[test]
    fn test_mean_of_consecutive_intervals() {
        // Intervals after sorting: 1d, 3d
        let feed = feed_with_dates(&[Some(day(5)), Some(day(1)), Some(day(2))]);
        assert_eq!(estimate_cadence(&feed), Some(TimeDelta::days(2)));
    }

    #[test]
    fn test_source_order_does_not_matter() {
        let a = feed_with_dates(&[Some(day(1)), Some(day(3)), Some(day(5))]);
        let b = feed_with_dates(&[Some(day(5)), Some(day(1)), Some(day(3))]);
        assert_eq!(estimate_cadence(&a), estimate_cadence(&b));
        assert_eq!(estimate_cadence(&a), Some(TimeDelta::days(2)));
    }

    #[test]
    fn test_undated_posts_are_ignored() {
        let feed = feed_with_dates(&[Some(day(1)), None, Some(day(7)), None]);
        assert_eq!(estimate_cadence(&feed), Some(TimeDelta::days(6)));
    }

    #[test]
    fn test_identical_dates_give_zero_not_none() {
        let feed = feed_with_dates(&[Some(day(2)), Some(day(2))]);
        assert_eq!(estimate_cadence(&feed), Some(TimeDelta::zero()));
    }
}
