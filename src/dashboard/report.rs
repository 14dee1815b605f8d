//! One refresh pass: fetch a snapshot, derive every dashboard view

use crate::catalog::MetricCatalog;
use crate::engine::{
    active_users, bucket_by_day, bucket_by_week, build_funnel, classify_new_vs_returning, cohort_retention, conversion_rate,
    distinct_users, event_breakdown, feature_adoption, latency_by_category, normalize_events, platform_breakdown, segment_users,
    session_stage_funnel, store_inventory, top_users, users_with_event, window_filter, ActiveUsers, ChatMessage,
    ChatSession, CohortRow, DailyBucket, Event, EventCount, FeatureAdoption, Funnel, LatencyRow, NewVsReturning, Segment,
    StoreInventory, TimeRange, Timestamped, UserActivity, WeeklyBucket,
};
use crate::store::{EventQuery, EventStore, InventorySnapshot, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const TOP_USERS_LIMIT: usize = 10;

/// Everything a pass fetched, already normalized
#[derive(Debug, Clone, Default)]
pub struct PassInput {
    pub events: Vec<Event>,
    pub sessions: Vec<ChatSession>,
    pub messages: Vec<ChatMessage>,
    pub inventory: InventorySnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub total_events: usize,
    pub unique_users: usize,
    /// Always trailing from `generated_at`, independent of the selected range
    pub active: ActiveUsers,
    pub daily: Vec<DailyBucket>,
    pub weekly: Vec<WeeklyBucket>,
    pub events: Vec<EventCount>,
    pub platforms: Vec<EventCount>,
    pub top_users: Vec<UserActivity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedFunnel {
    pub name: String,
    #[serde(flatten)]
    pub funnel: Funnel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRow {
    pub name: String,
    pub from_event: String,
    pub to_event: String,
    pub from_users: usize,
    pub converted_users: usize,
    pub rate_pct: i64,
}

/// Serializable output of one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub range: String,
    pub generated_at: DateTime<Utc>,
    pub overview: Overview,
    pub features: Vec<FeatureAdoption>,
    pub funnels: Vec<NamedFunnel>,
    pub session_funnel: Funnel,
    pub conversions: Vec<ConversionRow>,
    pub retention: Vec<CohortRow>,
    pub segments: Vec<Segment>,
    pub latency: Vec<LatencyRow>,
    pub new_vs_returning: NewVsReturning,
    pub inventory: Vec<StoreInventory>,
}

/// Earliest instant a pass must fetch from
///
/// Range-scoped views only need the range, but cohorts look back
/// `weeks_back` weeks and active users 30 days regardless of selection.
pub fn fetch_lower_bound(catalog: &MetricCatalog, range: TimeRange, now: DateTime<Utc>) -> DateTime<Utc> {
    let cohort_start = Duration::try_weeks(catalog.cohort.weeks_back as i64)
        .and_then(|lookback| now.checked_sub_signed(lookback))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let monthly_start = now - Duration::days(30);
    range.lower_bound(now).min(cohort_start).min(monthly_start)
}

fn in_range<T: Clone + Timestamped>(records: &[T], start: DateTime<Utc>) -> Vec<T> {
    window_filter(records, start, None).into_iter().cloned().collect()
}

/// Derive the full report from an already-fetched snapshot
///
/// Pure: the same input, catalog, range and `now` always produce the same
/// report.
pub fn build_report(input: &PassInput, catalog: &MetricCatalog, range: TimeRange, now: DateTime<Utc>) -> DashboardReport {
    let start = range.lower_bound(now);
    let events = in_range(&input.events, start);
    let sessions = in_range(&input.sessions, start);
    let messages = in_range(&input.messages, start);

    let overview = Overview {
        total_events: events.len(),
        unique_users: distinct_users(&events).len(),
        active: active_users(&input.events, now),
        daily: bucket_by_day(&events, |e| e.user_id.as_str()),
        weekly: bucket_by_week(&events, |e| e.user_id.as_str(), catalog.weekly_special_event.as_deref()),
        events: event_breakdown(&events),
        platforms: platform_breakdown(&events),
        top_users: top_users(&events, TOP_USERS_LIMIT),
    };

    let funnels = catalog
        .funnels
        .iter()
        .map(|def| NamedFunnel {
            name: def.name.clone(),
            funnel: build_funnel(&events, &def.steps),
        })
        .collect();

    let conversions = catalog
        .conversions
        .iter()
        .map(|def| {
            let from = users_with_event(&events, &def.from_event);
            let to = users_with_event(&events, &def.to_event);
            ConversionRow {
                name: def.name.clone(),
                from_event: def.from_event.clone(),
                to_event: def.to_event.clone(),
                from_users: from.len(),
                converted_users: to.intersection(&from).count(),
                rate_pct: conversion_rate(&to, &from),
            }
        })
        .collect();

    let value_key = catalog.segment_value_key.as_str();
    let nvr = &catalog.new_vs_returning;

    DashboardReport {
        range: range.as_str().to_string(),
        generated_at: now,
        overview,
        features: feature_adoption(&events, &catalog.features),
        funnels,
        session_funnel: session_stage_funnel(&sessions, &catalog.session_stages),
        conversions,
        retention: cohort_retention(&input.events, catalog.cohort.weeks_back, &catalog.cohort.checkpoints, now),
        segments: segment_users(&events, &catalog.segments, |e| e.properties.get_number(value_key, 0.0)),
        latency: latency_by_category(&messages),
        new_vs_returning: classify_new_vs_returning(&events, &nvr.marker_event, &nvr.new_flag, &nvr.returning_flag),
        inventory: store_inventory(&input.inventory.stores, &input.inventory.promotions, &input.inventory.offerings),
    }
}

/// Fetch everything a report needs from `store`
pub async fn fetch_input(store: &dyn EventStore, since: DateTime<Utc>) -> Result<PassInput, StoreError> {
    let raw = store.fetch_events(&EventQuery::since(since)).await?;
    let sessions = store.fetch_sessions(since).await?;
    let messages = store.fetch_messages(since).await?;
    let inventory = store.fetch_inventory().await?;

    Ok(PassInput {
        events: normalize_events(raw),
        sessions,
        messages,
        inventory,
    })
}

/// Fetch and aggregate in one go
///
/// Any store failure aborts the whole pass; there is no partial report.
pub async fn run_pass(
    store: &dyn EventStore,
    catalog: &MetricCatalog,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<DashboardReport, StoreError> {
    let started = Instant::now();
    let since = fetch_lower_bound(catalog, range, now);
    let input = fetch_input(store, since).await?;
    let fetched_in = started.elapsed();

    let report = build_report(&input, catalog, range, now);

    log::debug!(
        "📊 Pass [{}] via {}: {} events, {} sessions, {} messages (fetch {:?}, total {:?})",
        range,
        store.backend_type(),
        input.events.len(),
        input.sessions.len(),
        input.messages.len(),
        fetched_in,
        started.elapsed()
    );

    Ok(report)
}
