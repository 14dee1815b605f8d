//! Activity-tier segmentation of users

use super::conversion::mean_of;
use super::types::Event;
use crate::catalog::SegmentThreshold;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub label: String,
    pub min_events: usize,
    pub user_count: usize,
    pub avg_events_per_user: i64,
    pub avg_value_per_user: i64,
}

#[derive(Default)]
struct UserTotals {
    events: usize,
    value: f64,
}

/// Assign every user to the highest threshold their event count meets
///
/// Thresholds are inclusive and evaluated from the highest `min_events`
/// down; the first match wins. Output follows that same high-to-low order
/// and contains every threshold, including empty ones. Users below every
/// threshold belong to no segment.
///
/// `value_extractor` yields the per-event value summed per user (for example
/// a savings amount); return 0 for events without one.
pub fn segment_users<F>(records: &[Event], thresholds: &[SegmentThreshold], value_extractor: F) -> Vec<Segment>
where
    F: Fn(&Event) -> f64,
{
    // BTreeMap so per-segment float sums always add users in the same order
    let mut per_user: BTreeMap<&str, UserTotals> = BTreeMap::new();
    for e in records {
        let totals = per_user.entry(e.user_id.as_str()).or_default();
        totals.events += 1;
        totals.value += value_extractor(e);
    }

    let mut ordered: Vec<&SegmentThreshold> = thresholds.iter().collect();
    ordered.sort_by(|a, b| b.min_events.cmp(&a.min_events));

    let mut sums: Vec<(usize, usize, f64)> = vec![(0, 0, 0.0); ordered.len()];
    for totals in per_user.values() {
        if let Some(idx) = ordered.iter().position(|t| totals.events >= t.min_events) {
            let slot = &mut sums[idx];
            slot.0 += 1;
            slot.1 += totals.events;
            slot.2 += totals.value;
        }
    }

    ordered
        .into_iter()
        .zip(sums)
        .map(|(threshold, (users, events, value))| Segment {
            label: threshold.label.clone(),
            min_events: threshold.min_events,
            user_count: users,
            avg_events_per_user: mean_of(events as f64, users).round() as i64,
            avg_value_per_user: mean_of(value, users).round() as i64,
        })
        .collect()
}
