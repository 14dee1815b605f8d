//! Funnel construction and drop-off analysis
//!
//! Steps are counted independently: a user reaching step N is not required to
//! have been seen at step N-1. When a later step has more users than an
//! earlier one the drop-off is reported as a negative number, never clamped.

use super::conversion::percent_or_none;
use super::types::{ChatSession, Event};
use crate::catalog::FunnelStepDef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Label used for sessions whose state is not one of the funnel stages
pub const OTHER_STAGE: &str = "other";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub label: String,
    pub event_name: String,
    pub event_count: usize,
    pub unique_user_count: usize,
    /// Users lost since the previous step; `None` on the first step
    pub dropoff_count: Option<i64>,
    /// Drop-off as a rounded percentage of the previous step's users; `None`
    /// on the first step or when the previous step had no users
    pub dropoff_pct: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funnel {
    pub steps: Vec<FunnelStep>,
    /// Index of the step whose incoming transition lost the largest share of
    /// users
    pub biggest_dropoff: Option<usize>,
}

impl Funnel {
    pub fn biggest_dropoff_step(&self) -> Option<&FunnelStep> {
        self.biggest_dropoff.and_then(|i| self.steps.get(i))
    }
}

fn link_steps(mut steps: Vec<FunnelStep>) -> Funnel {
    for i in 1..steps.len() {
        let prev = steps[i - 1].unique_user_count as i64;
        let cur = steps[i].unique_user_count as i64;
        let dropoff = prev - cur;
        steps[i].dropoff_count = Some(dropoff);
        steps[i].dropoff_pct = percent_or_none(dropoff as f64, prev as f64);
    }

    let mut biggest: Option<(usize, i64)> = None;
    for (i, step) in steps.iter().enumerate().skip(1) {
        if let Some(pct) = step.dropoff_pct {
            if biggest.map_or(true, |(_, best)| pct > best) {
                biggest = Some((i, pct));
            }
        }
    }

    Funnel {
        steps,
        biggest_dropoff: biggest.map(|(i, _)| i),
    }
}

/// Event funnel over ordered step definitions
///
/// A step whose event never occurs (including names unknown to the catalog)
/// is a zero-count step, not an error.
pub fn build_funnel(records: &[Event], steps: &[FunnelStepDef]) -> Funnel {
    let rows = steps
        .iter()
        .map(|def| {
            let mut event_count = 0;
            let mut users = BTreeSet::new();
            for e in records.iter().filter(|e| e.name == def.event_name) {
                event_count += 1;
                users.insert(e.user_id.as_str());
            }
            FunnelStep {
                label: def.label.clone(),
                event_name: def.event_name.clone(),
                event_count,
                unique_user_count: users.len(),
                dropoff_count: None,
                dropoff_pct: None,
            }
        })
        .collect();

    link_steps(rows)
}

/// Funnel over chat sessions, where `stages` lists state names in flow order
///
/// A session currently at stage `i` has passed through every stage `0..=i`.
/// Sessions in a state not listed are ignored. `event_count` counts sessions.
pub fn session_stage_funnel(sessions: &[ChatSession], stages: &[String]) -> Funnel {
    let mut session_counts = vec![0usize; stages.len()];
    let mut users: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); stages.len()];
    let mut unmatched = 0usize;

    for session in sessions {
        let Some(reached) = stages.iter().position(|s| *s == session.state) else {
            unmatched += 1;
            continue;
        };
        for stage in 0..=reached {
            session_counts[stage] += 1;
            users[stage].insert(session.user_id.as_str());
        }
    }

    if unmatched > 0 {
        log::debug!("{} sessions in stages outside the funnel ({})", unmatched, OTHER_STAGE);
    }

    let rows = stages
        .iter()
        .enumerate()
        .map(|(i, stage)| FunnelStep {
            label: stage.clone(),
            event_name: stage.clone(),
            event_count: session_counts[i],
            unique_user_count: users[i].len(),
            dropoff_count: None,
            dropoff_pct: None,
        })
        .collect();

    link_steps(rows)
}
