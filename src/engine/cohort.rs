//! Weekly cohort retention
//!
//! Cohort windows are trailing 7-day spans counted back from `now`:
//! cohort `i` covers `[now - (i+1)w, now - iw)`. A cohort is every user with
//! at least one event in its window (activity in the week, not first-ever
//! use). Checkpoint `k` asks how many of those users were active again in
//! `[start + kw, start + (k+1)w)`.

use super::conversion::percent;
use super::types::Event;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRetention {
    pub weeks_after: u32,
    /// Rounded percentage of the cohort active in the checkpoint week; 0 when
    /// that week has not fully elapsed
    pub retention_pct: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRow {
    pub cohort_start: NaiveDate,
    pub window_start: DateTime<Utc>,
    pub initial_user_count: usize,
    pub retention: Vec<CheckpointRetention>,
}

fn users_between(records: &[Event], start: DateTime<Utc>, end: DateTime<Utc>) -> BTreeSet<&str> {
    records
        .iter()
        .filter(|e| e.timestamp >= start && e.timestamp < end)
        .map(|e| e.user_id.as_str())
        .collect()
}

fn shift_weeks(at: DateTime<Utc>, weeks: i64) -> Option<DateTime<Utc>> {
    at.checked_add_signed(Duration::try_weeks(weeks)?)
}

/// Retention matrix for the `weeks_back` most recent cohort weeks
///
/// Rows are chronological (oldest cohort first). Cohorts without users are
/// omitted. A checkpoint week ending after `now` reports 0 rather than a
/// partial-window value.
pub fn cohort_retention(records: &[Event], weeks_back: u32, checkpoints: &[u32], now: DateTime<Utc>) -> Vec<CohortRow> {
    let Some(earliest) = records.iter().map(|e| e.timestamp).min() else {
        return Vec::new();
    };
    // Cohorts whose window ends before the earliest record are always empty
    let reachable = (now - earliest).num_weeks().max(0) + 1;
    let weeks_back = (weeks_back as i64).min(reachable);
    let mut rows = Vec::new();

    for i in (0..weeks_back).rev() {
        let Some(start) = shift_weeks(now, -(i + 1)) else {
            continue;
        };
        let Some(end) = shift_weeks(start, 1) else {
            continue;
        };
        let cohort = users_between(records, start, end);
        if cohort.is_empty() {
            continue;
        }

        let retention = checkpoints
            .iter()
            .map(|&k| {
                let window = shift_weeks(start, k as i64).and_then(|s| Some((s, shift_weeks(s, 1)?)));
                let retention_pct = match window {
                    Some((check_start, check_end)) if check_end <= now => {
                        let active = users_between(records, check_start, check_end);
                        let retained = cohort.intersection(&active).count();
                        percent(retained as f64, cohort.len() as f64)
                    }
                    // Ends after now, or past the representable calendar
                    _ => 0,
                };
                CheckpointRetention {
                    weeks_after: k,
                    retention_pct,
                }
            })
            .collect();

        rows.push(CohortRow {
            cohort_start: start.date_naive(),
            window_start: start,
            initial_user_count: cohort.len(),
            retention,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64, user: &str) -> Event {
        Event::new(now() - Duration::days(days), user, "app_opened")
    }

    #[test]
    fn test_retention_checkpoints() {
        let events = vec![
            // cohort window 3 weeks ago: [now-28d, now-21d)
            days_ago(27, "a"),
            days_ago(26, "b"),
            days_ago(25, "c"),
            days_ago(24, "d"),
            // +1 week: [now-21d, now-14d)
            days_ago(20, "a"),
            days_ago(19, "b"),
            // +2 weeks: [now-14d, now-7d)
            days_ago(10, "a"),
        ];

        let rows = cohort_retention(&events, 4, &[1, 2, 4], now());
        let oldest = &rows[0];
        assert_eq!(oldest.window_start, now() - Duration::days(28));
        assert_eq!(oldest.initial_user_count, 4);
        let pcts: Vec<i64> = oldest.retention.iter().map(|r| r.retention_pct).collect();
        // +4 weeks would end 7 days in the future
        assert_eq!(pcts, vec![50, 25, 0]);
    }

    #[test]
    fn test_checkpoint_past_now_is_zero() {
        // Cohort 2 weeks back with everyone active again last week
        let events = vec![days_ago(13, "a"), days_ago(12, "b"), days_ago(3, "a"), days_ago(2, "b")];

        let rows = cohort_retention(&events, 2, &[1, 4], now());
        let cohort = rows
            .iter()
            .find(|r| r.window_start == now() - Duration::days(14))
            .unwrap();
        assert_eq!(cohort.retention[0].retention_pct, 100);
        assert_eq!(cohort.retention[1].weeks_after, 4);
        assert_eq!(cohort.retention[1].retention_pct, 0);
    }

    #[test]
    fn test_rows_chronological_and_empty_cohorts_skipped() {
        let events = vec![days_ago(30, "a"), days_ago(2, "b")];

        let rows = cohort_retention(&events, 6, &[1], now());
        assert_eq!(rows.len(), 2);
        assert!(rows[0].window_start < rows[1].window_start);
        assert_eq!(rows[1].window_start, now() - Duration::days(7));
        // most recent cohort's first checkpoint ends after now
        assert_eq!(rows[1].retention[0].retention_pct, 0);
    }

    #[test]
    fn test_oversized_lookback_and_checkpoints() {
        let events = vec![days_ago(10, "a"), days_ago(3, "a")];

        let rows = cohort_retention(&events, u32::MAX, &[1, u32::MAX], now());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].window_start, now() - Duration::days(14));
        assert_eq!(rows[0].retention[0].retention_pct, 100);
        assert_eq!(rows[0].retention[1].weeks_after, u32::MAX);
        assert_eq!(rows[0].retention[1].retention_pct, 0);
    }

    #[test]
    fn test_no_records() {
        assert!(cohort_retention(&[], 4, &[1, 2, 4], now()).is_empty());
    }
}
