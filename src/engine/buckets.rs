//! Day and week bucketing of events
//!
//! Buckets are keyed by the canonical `NaiveDate` of the record's own UTC
//! timestamp (weeks start Monday). Maps are sparse: a period without events
//! has no bucket at all, and output is ascending by date.

use super::conversion::percent;
use super::types::Event;
use super::window::{day_of, week_start};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub event_count: usize,
    pub unique_user_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBucket {
    pub week_start: NaiveDate,
    pub unique_user_count: usize,
    pub special_event_count: usize,
    /// Special events per unique user in the week (2 decimals)
    pub ratio: f64,
}

#[derive(Default)]
struct BucketAccumulator<'a> {
    event_count: usize,
    special_event_count: usize,
    keys: BTreeSet<&'a str>,
}

fn accumulate<'a, K, F>(records: &'a [Event], period: K, key_fn: F, special: Option<&str>) -> BTreeMap<NaiveDate, BucketAccumulator<'a>>
where
    K: Fn(DateTime<Utc>) -> NaiveDate,
    F: Fn(&'a Event) -> &'a str,
{
    let mut buckets: BTreeMap<NaiveDate, BucketAccumulator<'a>> = BTreeMap::new();
    for record in records {
        let acc = buckets.entry(period(record.timestamp)).or_default();
        acc.event_count += 1;
        acc.keys.insert(key_fn(record));
        if special.map_or(false, |name| record.name == name) {
            acc.special_event_count += 1;
        }
    }
    buckets
}

/// Group events by UTC day
///
/// `key_fn` selects the identity counted for `unique_user_count`, usually
/// `|e| e.user_id.as_str()`.
pub fn bucket_by_day<'a, F>(records: &'a [Event], key_fn: F) -> Vec<DailyBucket>
where
    F: Fn(&'a Event) -> &'a str,
{
    accumulate(records, day_of, key_fn, None)
        .into_iter()
        .map(|(date, acc)| DailyBucket {
            date,
            event_count: acc.event_count,
            unique_user_count: acc.keys.len(),
        })
        .collect()
}

/// Group events by Monday-start UTC week
///
/// `special_event` names the event counted into `special_event_count`; with
/// `None` the count and ratio are always 0.
pub fn bucket_by_week<'a, F>(records: &'a [Event], key_fn: F, special_event: Option<&str>) -> Vec<WeeklyBucket>
where
    F: Fn(&'a Event) -> &'a str,
{
    accumulate(records, week_start, key_fn, special_event)
        .into_iter()
        .map(|(week_start, acc)| {
            let users = acc.keys.len();
            let ratio = if users == 0 {
                0.0
            } else {
                (acc.special_event_count as f64 / users as f64 * 100.0).round() / 100.0
            };
            WeeklyBucket {
                week_start,
                unique_user_count: users,
                special_event_count: acc.special_event_count,
                ratio,
            }
        })
        .collect()
}

/// The last `n` non-empty buckets (not the last `n` calendar days)
pub fn last_n_buckets<T: Clone>(buckets: &[T], n: usize) -> Vec<T> {
    let skip = buckets.len().saturating_sub(n);
    buckets[skip..].to_vec()
}

/// Trailing active-user counts relative to `now`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveUsers {
    pub daily: usize,
    pub weekly: usize,
    pub monthly: usize,
    /// Daily / weekly active users, as a rounded percentage
    pub stickiness_pct: i64,
}

/// Unique users active in the 24h, 7d and 30d before `now` (now exclusive)
pub fn active_users(records: &[Event], now: DateTime<Utc>) -> ActiveUsers {
    let in_window = |span: Duration| -> usize {
        let start = now - span;
        records
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp < now)
            .map(|e| e.user_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    };

    let daily = in_window(Duration::hours(24));
    let weekly = in_window(Duration::days(7));
    let monthly = in_window(Duration::days(30));

    ActiveUsers {
        daily,
        weekly,
        monthly,
        stickiness_pct: percent(daily as f64, weekly as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    fn sample() -> Vec<Event> {
        vec![
            Event::new(at(4, 9), "a", "open"),
            Event::new(at(4, 10), "a", "open"),
            Event::new(at(4, 23), "b", "search"),
            Event::new(at(6, 1), "a", "search"),
            Event::new(at(11, 8), "c", "open"),
            Event::new(at(10, 8), "c", "search"),
        ]
    }

    #[test]
    fn test_bucket_by_day_sparse_and_sorted() {
        let buckets = bucket_by_day(&sample(), |e| e.user_id.as_str());

        let dates: Vec<u32> = buckets.iter().map(|b| chrono::Datelike::day(&b.date)).collect();
        assert_eq!(dates, vec![4, 6, 10, 11]);
        assert_eq!(buckets[0].event_count, 3);
        assert_eq!(buckets[0].unique_user_count, 2);
    }

    #[test]
    fn test_bucket_conservation_and_uniqueness() {
        let events = sample();
        let buckets = bucket_by_day(&events, |e| e.user_id.as_str());

        let total: usize = buckets.iter().map(|b| b.event_count).sum();
        assert_eq!(total, events.len());

        for bucket in &buckets {
            let distinct: HashSet<&str> = events
                .iter()
                .filter(|e| e.timestamp.date_naive() == bucket.date)
                .map(|e| e.user_id.as_str())
                .collect();
            assert_eq!(bucket.unique_user_count, distinct.len());
        }
    }

    #[test]
    fn test_bucket_by_week_monday_start() {
        // Mar 4 is a Monday; Mar 10 is the following Sunday
        let buckets = bucket_by_week(&sample(), |e| e.user_id.as_str(), Some("search"));

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].week_start, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(buckets[0].unique_user_count, 3);
        assert_eq!(buckets[0].special_event_count, 3);
        assert_eq!(buckets[0].ratio, 1.0);
        assert_eq!(buckets[1].week_start, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(buckets[1].special_event_count, 0);
        assert_eq!(buckets[1].ratio, 0.0);
    }

    #[test]
    fn test_last_n_non_empty_buckets() {
        let buckets = bucket_by_day(&sample(), |e| e.user_id.as_str());
        let tail = last_n_buckets(&buckets, 2);
        assert_eq!(tail, buckets[2..].to_vec());
        assert_eq!(last_n_buckets(&buckets, 10).len(), 4);
    }

    #[test]
    fn test_active_users_stickiness() {
        let now = at(11, 12);
        let active = active_users(&sample(), now);

        // 7d window starts Mar 4 12:00, so a's two morning events on Mar 4 fall
        // outside it but a's Mar 6 event does not
        assert_eq!(active.daily, 1);
        assert_eq!(active.weekly, 3);
        assert_eq!(active.monthly, 3);
        assert_eq!(active.stickiness_pct, 33);
    }

    #[test]
    fn test_empty_input() {
        assert!(bucket_by_day(&[], |e| e.user_id.as_str()).is_empty());
        let active = active_users(&[], at(11, 12));
        assert_eq!(active.stickiness_pct, 0);
    }
}
