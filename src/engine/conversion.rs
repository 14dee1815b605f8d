//! Ratio helpers and user-set conversion

use super::types::Event;
use std::collections::BTreeSet;

/// `numerator / denominator * 100` rounded to the nearest integer; 0 when the
/// denominator is zero.
pub fn percent(numerator: f64, denominator: f64) -> i64 {
    percent_or_none(numerator, denominator).unwrap_or(0)
}

/// Like [`percent`] but `None` for a zero denominator, for cells rendered
/// empty rather than as 0.
pub fn percent_or_none(numerator: f64, denominator: f64) -> Option<i64> {
    if denominator == 0.0 {
        return None;
    }
    let pct = numerator / denominator * 100.0;
    if pct.is_finite() {
        Some(pct.round() as i64)
    } else {
        None
    }
}

/// Arithmetic mean, 0 for an empty input
pub fn mean_of(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Users with at least one event named `name`
pub fn users_with_event(records: &[Event], name: &str) -> BTreeSet<String> {
    records
        .iter()
        .filter(|e| e.name == name)
        .map(|e| e.user_id.clone())
        .collect()
}

/// All distinct users in `records`
pub fn distinct_users(records: &[Event]) -> BTreeSet<String> {
    records.iter().map(|e| e.user_id.clone()).collect()
}

/// Share of the denominator set that also appears in the numerator set
pub fn conversion_rate(numerator: &BTreeSet<String>, denominator: &BTreeSet<String>) -> i64 {
    let converted = denominator.intersection(numerator).count();
    percent(converted as f64, denominator.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_zero_denominator() {
        assert_eq!(conversion_rate(&set(&[]), &set(&[])), 0);
        assert_eq!(conversion_rate(&set(&["a"]), &set(&[])), 0);
        assert_eq!(percent(5.0, 0.0), 0);
        assert_eq!(percent_or_none(5.0, 0.0), None);
    }

    #[test]
    fn test_conversion_uses_intersection() {
        // "z" converted without being in the denominator and must not count
        let numerator = set(&["a", "b", "z"]);
        let denominator = set(&["a", "b", "c"]);
        assert_eq!(conversion_rate(&numerator, &denominator), 67);
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(30.0, 80.0), 38);
        assert_eq!(percent(1.0, 3.0), 33);
        assert_eq!(percent(-10.0, 80.0), -13);
    }

    #[test]
    fn test_users_with_event() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let events = vec![
            Event::new(t, "a", "signup"),
            Event::new(t, "a", "signup"),
            Event::new(t, "b", "login"),
        ];
        assert_eq!(users_with_event(&events, "signup"), set(&["a"]));
        assert_eq!(distinct_users(&events).len(), 2);
    }
}
