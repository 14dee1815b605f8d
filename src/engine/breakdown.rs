//! Per-name, per-user, per-platform and per-feature breakdowns
//!
//! Every ranking here sorts by count descending and breaks ties by the order
//! in which keys were first seen in the input.

use super::conversion::{distinct_users, percent};
use super::types::Event;
use crate::catalog::FeatureDef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Bucket name used for absent categorical values
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCount {
    pub name: String,
    pub event_count: usize,
    pub unique_user_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: String,
    pub event_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAdoption {
    pub feature: String,
    pub event_count: usize,
    pub unique_user_count: usize,
    /// Feature users as a share of all users in the input
    pub adoption_pct: i64,
}

/// Count + distinct users per key, kept in first-seen order
struct FirstSeenCounter<'a> {
    index: HashMap<&'a str, usize>,
    rows: Vec<(&'a str, usize, BTreeSet<&'a str>)>,
}

impl<'a> FirstSeenCounter<'a> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            rows: Vec::new(),
        }
    }

    fn add(&mut self, key: &'a str, user: &'a str) {
        let idx = match self.index.get(key) {
            Some(idx) => *idx,
            None => {
                self.rows.push((key, 0, BTreeSet::new()));
                self.index.insert(key, self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        let row = &mut self.rows[idx];
        row.1 += 1;
        row.2.insert(user);
    }

    /// Rows sorted by count descending; `sort_by` is stable so equal counts
    /// keep first-seen order
    fn ranked(mut self) -> Vec<(&'a str, usize, BTreeSet<&'a str>)> {
        self.rows.sort_by(|a, b| b.1.cmp(&a.1));
        self.rows
    }
}

/// Event count and unique users per event name
pub fn event_breakdown(records: &[Event]) -> Vec<EventCount> {
    let mut counter = FirstSeenCounter::new();
    for e in records {
        counter.add(e.name.as_str(), e.user_id.as_str());
    }

    counter
        .ranked()
        .into_iter()
        .map(|(name, count, users)| EventCount {
            name: name.to_string(),
            event_count: count,
            unique_user_count: users.len(),
        })
        .collect()
}

/// Same shape as [`event_breakdown`], keyed by platform
pub fn platform_breakdown(records: &[Event]) -> Vec<EventCount> {
    let mut counter = FirstSeenCounter::new();
    for e in records {
        counter.add(e.platform.as_deref().unwrap_or(UNKNOWN), e.user_id.as_str());
    }

    counter
        .ranked()
        .into_iter()
        .map(|(name, count, users)| EventCount {
            name: name.to_string(),
            event_count: count,
            unique_user_count: users.len(),
        })
        .collect()
}

/// The `limit` users with the most events
pub fn top_users(records: &[Event], limit: usize) -> Vec<UserActivity> {
    let mut counter = FirstSeenCounter::new();
    for e in records {
        counter.add(e.user_id.as_str(), e.user_id.as_str());
    }

    counter
        .ranked()
        .into_iter()
        .take(limit)
        .map(|(user, count, _)| UserActivity {
            user_id: user.to_string(),
            event_count: count,
        })
        .collect()
}

/// Usage per catalog feature, in catalog order
pub fn feature_adoption(records: &[Event], features: &[FeatureDef]) -> Vec<FeatureAdoption> {
    let total_users = distinct_users(records).len();

    features
        .iter()
        .map(|feature| {
            let names: BTreeSet<&str> = feature.events.iter().map(String::as_str).collect();
            let mut event_count = 0;
            let mut users = BTreeSet::new();
            for e in records.iter().filter(|e| names.contains(e.name.as_str())) {
                event_count += 1;
                users.insert(e.user_id.as_str());
            }

            FeatureAdoption {
                feature: feature.name.clone(),
                event_count,
                unique_user_count: users.len(),
                adoption_pct: percent(users.len() as f64, total_users as f64),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ev(user: &str, name: &str) -> Event {
        Event::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), user, name)
    }

    #[test]
    fn test_event_breakdown_sorted_with_stable_ties() {
        let events = vec![
            ev("a", "search"),
            ev("a", "open"),
            ev("b", "basket"),
            ev("b", "open"),
            ev("c", "search"),
            ev("c", "basket"),
            ev("c", "open"),
        ];

        let rows = event_breakdown(&events);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        // search and basket tie at 2; search was seen first
        assert_eq!(names, vec!["open", "search", "basket"]);
        assert_eq!(rows[0].event_count, 3);
        assert_eq!(rows[0].unique_user_count, 3);
    }

    #[test]
    fn test_platform_unknown_bucket() {
        let events = vec![
            ev("a", "open").with_platform("ios"),
            ev("b", "open"),
            ev("c", "open"),
        ];

        let rows = platform_breakdown(&events);
        assert_eq!(rows[0].name, UNKNOWN);
        assert_eq!(rows[0].unique_user_count, 2);
        assert_eq!(rows[1].name, "ios");
    }

    #[test]
    fn test_top_users_limit_and_ties() {
        let events = vec![ev("b", "x"), ev("a", "x"), ev("a", "x"), ev("c", "x"), ev("b", "x")];

        let top = top_users(&events, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, "b");
        assert_eq!(top[1].user_id, "a");
    }

    #[test]
    fn test_feature_adoption() {
        let features = vec![
            FeatureDef {
                name: "Basket".to_string(),
                events: vec!["basket_results_displayed".to_string(), "basket_created".to_string()],
            },
            FeatureDef {
                name: "Chat".to_string(),
                events: vec!["chat_opened".to_string()],
            },
        ];
        let events = vec![
            ev("a", "basket_created"),
            ev("a", "basket_results_displayed"),
            ev("b", "open"),
            ev("c", "basket_created"),
        ];

        let rows = feature_adoption(&events, &features);
        assert_eq!(rows[0].event_count, 3);
        assert_eq!(rows[0].unique_user_count, 2);
        assert_eq!(rows[0].adoption_pct, 67);
        assert_eq!(rows[1].event_count, 0);
        assert_eq!(rows[1].adoption_pct, 0);
    }
}
