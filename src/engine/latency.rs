//! Nearest-rank percentiles and response latency rows

use super::breakdown::UNKNOWN;
use super::conversion::mean_of;
use super::types::{ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileSummary {
    /// One value per requested fraction, in request order
    pub values: Vec<f64>,
    pub mean: f64,
}

/// Nearest-rank percentiles: sort ascending, pick `floor(f * n)` clamped to
/// `[0, n-1]`
///
/// NaN and infinite values are ignored. An empty input yields 0 for every
/// target and for the mean.
pub fn percentiles(values: &[f64], targets: &[f64]) -> PercentileSummary {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return PercentileSummary {
            values: vec![0.0; targets.len()],
            mean: 0.0,
        };
    }

    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();

    let picked = targets
        .iter()
        .map(|f| {
            let idx = (f * n as f64).floor();
            let idx = if idx.is_nan() || idx < 0.0 { 0 } else { (idx as usize).min(n - 1) };
            sorted[idx]
        })
        .collect();

    PercentileSummary {
        values: picked,
        mean: mean_of(sorted.iter().sum(), n),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyRow {
    pub category: String,
    pub count: usize,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
}

/// Assistant response latency per `response_type`
///
/// Only assistant messages with a non-negative `processing_ms` count;
/// messages without a response type fall into `"unknown"`. Rows are ordered
/// by count descending, ties in first-seen order. Latencies are rounded to
/// whole milliseconds.
pub fn latency_by_category(messages: &[ChatMessage]) -> Vec<LatencyRow> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<f64>)> = Vec::new();

    for msg in messages {
        if msg.role != MessageRole::Assistant {
            continue;
        }
        let Some(ms) = msg.processing_ms.filter(|ms| ms.is_finite() && *ms >= 0.0) else {
            continue;
        };
        let category = msg.response_type.as_deref().unwrap_or(UNKNOWN);
        let idx = *index.entry(category).or_insert_with(|| {
            groups.push((category, Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(ms);
    }

    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    groups
        .into_iter()
        .map(|(category, values)| {
            let summary = percentiles(&values, &[0.5, 0.95]);
            LatencyRow {
                category: category.to_string(),
                count: values.len(),
                mean: summary.mean.round(),
                p50: summary.values[0].round(),
                p95: summary.values[1].round(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_empty_percentiles() {
        let summary = percentiles(&[], &[0.5, 0.95]);
        assert_eq!(summary.values, vec![0.0, 0.0]);
        assert_eq!(summary.mean, 0.0);
    }

    #[test]
    fn test_nearest_rank_index() {
        let values: Vec<f64> = (1..=10).rev().map(|v| v as f64 * 10.0).collect();
        let summary = percentiles(&values, &[0.0, 0.5, 0.95, 1.0]);

        // floor(0.5 * 10) = 5 -> 60; floor(0.95 * 10) = 9 -> 100; 1.0 clamps
        assert_eq!(summary.values, vec![10.0, 60.0, 100.0, 100.0]);
        assert_eq!(summary.mean, 55.0);
    }

    #[test]
    fn test_single_value() {
        let summary = percentiles(&[42.0], &[0.5, 0.95]);
        assert_eq!(summary.values, vec![42.0, 42.0]);
        assert_eq!(summary.mean, 42.0);
    }

    #[test]
    fn test_non_finite_values_ignored() {
        let summary = percentiles(&[f64::NAN, 10.0, f64::INFINITY, 30.0, f64::NEG_INFINITY], &[0.5]);
        assert_eq!(summary.values, vec![30.0]);
        assert_eq!(summary.mean, 20.0);

        let summary = percentiles(&[f64::NAN], &[0.5]);
        assert_eq!(summary.values, vec![0.0]);
        assert_eq!(summary.mean, 0.0);
    }

    fn msg(role: MessageRole, response_type: Option<&str>, ms: Option<f64>) -> ChatMessage {
        ChatMessage {
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            user_id: None,
            role,
            response_type: response_type.map(str::to_string),
            processing_ms: ms,
        }
    }

    #[test]
    fn test_latency_by_category() {
        let messages = vec![
            msg(MessageRole::User, Some("basket"), Some(9999.0)),
            msg(MessageRole::Assistant, Some("basket"), Some(1000.0)),
            msg(MessageRole::Assistant, Some("recipe"), Some(300.0)),
            msg(MessageRole::Assistant, Some("basket"), Some(3000.0)),
            msg(MessageRole::Assistant, None, Some(50.0)),
            msg(MessageRole::Assistant, Some("basket"), None),
            msg(MessageRole::Assistant, Some("recipe"), Some(-5.0)),
        ];

        let rows = latency_by_category(&messages);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].category, "basket");
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].mean, 2000.0);
        assert_eq!(rows[0].p50, 3000.0);
        assert_eq!(rows[0].p95, 3000.0);
        assert_eq!(rows[1].category, "recipe");
        assert_eq!(rows[2].category, UNKNOWN);
    }
}
