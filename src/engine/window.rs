//! Time windows: range selector, window filtering and calendar truncation

use super::types::Event;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

/// Dashboard range selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeRange {
    Hours24,
    Days7,
    Days30,
    Months3,
    Months6,
    Months9,
    Year1,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Hours24 => "24h",
            TimeRange::Days7 => "7d",
            TimeRange::Days30 => "30d",
            TimeRange::Months3 => "3m",
            TimeRange::Months6 => "6m",
            TimeRange::Months9 => "9m",
            TimeRange::Year1 => "1y",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "24h" => Some(TimeRange::Hours24),
            "7d" => Some(TimeRange::Days7),
            "30d" => Some(TimeRange::Days30),
            "3m" => Some(TimeRange::Months3),
            "6m" => Some(TimeRange::Months6),
            "9m" => Some(TimeRange::Months9),
            "1y" => Some(TimeRange::Year1),
            _ => None,
        }
    }

    pub fn all() -> [TimeRange; 7] {
        [
            TimeRange::Hours24,
            TimeRange::Days7,
            TimeRange::Days30,
            TimeRange::Months3,
            TimeRange::Months6,
            TimeRange::Months9,
            TimeRange::Year1,
        ]
    }

    /// Lower bound of the range relative to `now`.
    ///
    /// Month-based ranges step back whole calendar months (clamping the day
    /// of month), so `3m` before May 31 is Feb 29/28.
    pub fn lower_bound(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            TimeRange::Hours24 => return now - Duration::hours(24),
            TimeRange::Days7 => return now - Duration::days(7),
            TimeRange::Days30 => return now - Duration::days(30),
            TimeRange::Months3 => 3,
            TimeRange::Months6 => 6,
            TimeRange::Months9 => 9,
            TimeRange::Year1 => 12,
        };
        now.checked_sub_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything with an instant the engine can window on
pub trait Timestamped {
    fn instant(&self) -> DateTime<Utc>;
}

impl Timestamped for Event {
    fn instant(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for super::types::ChatSession {
    fn instant(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for super::types::ChatMessage {
    fn instant(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Records with `start <= t < end`. `end = None` leaves the window open.
pub fn window_filter<'a, T: Timestamped>(
    records: &'a [T],
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Vec<&'a T> {
    records
        .iter()
        .filter(|r| {
            let t = r.instant();
            t >= start && end.map_or(true, |e| t < e)
        })
        .collect()
}

/// UTC calendar day of an instant
pub fn day_of(t: DateTime<Utc>) -> NaiveDate {
    t.date_naive()
}

/// Monday of the UTC week containing `t`
pub fn week_start(t: DateTime<Utc>) -> NaiveDate {
    let day = t.date_naive();
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_time_range_round_trip_names() {
        for range in TimeRange::all() {
            assert_eq!(TimeRange::from_str(range.as_str()), Some(range));
        }
        assert_eq!(TimeRange::from_str("2w"), None);
    }

    #[test]
    fn test_lower_bounds() {
        let now = at(2024, 5, 31, 10);
        assert_eq!(TimeRange::Hours24.lower_bound(now), at(2024, 5, 30, 10));
        assert_eq!(TimeRange::Days7.lower_bound(now), at(2024, 5, 24, 10));
        assert_eq!(TimeRange::Days30.lower_bound(now), at(2024, 5, 1, 10));
        assert_eq!(TimeRange::Months3.lower_bound(now), at(2024, 2, 29, 10));
        assert_eq!(TimeRange::Months6.lower_bound(now), at(2023, 11, 30, 10));
        assert_eq!(TimeRange::Months9.lower_bound(now), at(2023, 8, 31, 10));
        assert_eq!(TimeRange::Year1.lower_bound(now), at(2023, 5, 31, 10));

        // Day of month clamps to the end of a leap February
        assert_eq!(TimeRange::Months6.lower_bound(at(2024, 8, 31, 10)), at(2024, 2, 29, 10));
        assert_eq!(TimeRange::Months9.lower_bound(at(2024, 11, 30, 10)), at(2024, 2, 29, 10));
        assert_eq!(TimeRange::Year1.lower_bound(at(2024, 2, 29, 10)), at(2023, 2, 28, 10));
    }

    #[test]
    fn test_window_filter_bounds() {
        let events = vec![
            Event::new(at(2024, 1, 1, 0), "a", "x"),
            Event::new(at(2024, 1, 2, 0), "b", "x"),
            Event::new(at(2024, 1, 3, 0), "c", "x"),
        ];

        let inside = window_filter(&events, at(2024, 1, 2, 0), Some(at(2024, 1, 3, 0)));
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].user_id, "b");

        let open = window_filter(&events, at(2024, 1, 2, 0), None);
        assert_eq!(open.len(), 2);
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2024-03-10 is a Sunday
        assert_eq!(week_start(at(2024, 3, 10, 23)), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(week_start(at(2024, 3, 11, 0)), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }
}
