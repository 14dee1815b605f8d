//! Refresh coordination and the retained display state
//!
//! Passes run concurrently: the coordinator spawns one per timer tick or
//! range change and never waits for the previous one. Each completed pass
//! writes into [`DisplayState`] in completion order (last write wins), except
//! that a pass computed for a range the user has since moved away from is
//! discarded. A failed pass changes nothing but `last_error`.

use super::report::{run_pass, DashboardReport};
use crate::catalog::MetricCatalog;
use crate::engine::TimeRange;
use crate::store::{EventStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Clock used to stamp passes
pub type NowFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub type SharedDisplay = Arc<RwLock<DisplayState>>;

/// Messages sent to the coordinator loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMessage {
    Refresh,
    SetRange(TimeRange),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    StaleRange,
    FetchFailed,
}

/// The report currently on display, tagged with the pass that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    pub pass_id: u64,
    pub report: DashboardReport,
}

#[derive(Debug)]
pub struct DisplayState {
    selected: TimeRange,
    latest: Option<DisplaySnapshot>,
    last_error: Option<String>,
}

impl DisplayState {
    pub fn new(selected: TimeRange) -> Self {
        Self {
            selected,
            latest: None,
            last_error: None,
        }
    }

    pub fn shared(selected: TimeRange) -> SharedDisplay {
        Arc::new(RwLock::new(Self::new(selected)))
    }

    pub fn selected(&self) -> TimeRange {
        self.selected
    }

    /// Switch ranges; the previous report stays on display until a pass for
    /// the new range lands
    pub fn select_range(&mut self, range: TimeRange) {
        self.selected = range;
    }

    pub fn current(&self) -> Option<&DisplaySnapshot> {
        self.latest.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record the result of a completed pass
    pub fn apply(&mut self, pass_id: u64, range: TimeRange, outcome: Result<DashboardReport, StoreError>) -> ApplyOutcome {
        match outcome {
            Err(e) => {
                log::warn!("⚠️  Refresh pass #{} failed, keeping previous report: {}", pass_id, e);
                self.last_error = Some(e.to_string());
                ApplyOutcome::FetchFailed
            }
            Ok(_) if range != self.selected => {
                log::debug!(
                    "Discarding pass #{} for {} (selected range is now {})",
                    pass_id,
                    range,
                    self.selected
                );
                ApplyOutcome::StaleRange
            }
            Ok(report) => {
                self.latest = Some(DisplaySnapshot { pass_id, report });
                self.last_error = None;
                ApplyOutcome::Applied
            }
        }
    }

    /// Seed the display from a saved snapshot
    ///
    /// Ignored when the snapshot was taken for a different range.
    pub fn restore(&mut self, snapshot: DisplaySnapshot) -> bool {
        if snapshot.report.range != self.selected.as_str() {
            log::info!(
                "Saved snapshot is for {} but {} is selected, not restoring",
                snapshot.report.range,
                self.selected
            );
            return false;
        }
        self.latest = Some(snapshot);
        true
    }
}

/// Spawns refresh passes and routes their results into the display state
pub struct RefreshCoordinator {
    store: Arc<dyn EventStore>,
    catalog: Arc<MetricCatalog>,
    display: SharedDisplay,
    now_fn: NowFn,
    next_pass: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn EventStore>, catalog: Arc<MetricCatalog>, display: SharedDisplay) -> Self {
        Self::new_with_now_fn(store, catalog, display, Arc::new(Utc::now))
    }

    /// Coordinator with an injected clock (for tests)
    pub fn new_with_now_fn(
        store: Arc<dyn EventStore>,
        catalog: Arc<MetricCatalog>,
        display: SharedDisplay,
        now_fn: NowFn,
    ) -> Self {
        Self {
            store,
            catalog,
            display,
            now_fn,
            // 0 is reserved for snapshots restored from disk
            next_pass: AtomicU64::new(1),
        }
    }

    pub fn display(&self) -> SharedDisplay {
        self.display.clone()
    }

    /// Start a pass for the currently selected range without waiting for it
    pub async fn spawn_pass(&self) -> JoinHandle<ApplyOutcome> {
        let range = self.display.read().await.selected();
        self.spawn_pass_for(range)
    }

    /// Start a pass for `range`, whatever is selected when it completes
    pub fn spawn_pass_for(&self, range: TimeRange) -> JoinHandle<ApplyOutcome> {
        let pass_id = self.next_pass.fetch_add(1, Ordering::Relaxed);
        let now = (self.now_fn)();
        let store = self.store.clone();
        let catalog = self.catalog.clone();
        let display = self.display.clone();

        tokio::spawn(async move {
            let outcome = run_pass(store.as_ref(), &catalog, range, now).await;
            let applied = display.write().await.apply(pass_id, range, outcome);
            if applied == ApplyOutcome::Applied {
                log::debug!("✅ Pass #{} applied ({})", pass_id, range);
            }
            applied
        })
    }

    /// Drive passes from a timer and from `rx` until shutdown
    ///
    /// Passes still in flight at shutdown are left to finish on their own.
    pub async fn run(self, mut rx: mpsc::Receiver<RefreshMessage>, refresh_interval: Duration) {
        log::info!("🔄 Refresh coordinator started");
        log::info!("   ├─ Store: {}", self.store.backend_type());
        log::info!("   └─ Interval: {:?}", refresh_interval);

        let mut timer = interval(refresh_interval);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.spawn_pass().await;
                }
                message = rx.recv() => match message {
                    Some(RefreshMessage::Refresh) => {
                        self.spawn_pass().await;
                    }
                    Some(RefreshMessage::SetRange(range)) => {
                        log::info!("📅 Range changed to {}", range);
                        self.display.write().await.select_range(range);
                        self.spawn_pass_for(range);
                    }
                    Some(RefreshMessage::Shutdown) | None => {
                        log::info!("Refresh coordinator received shutdown signal");
                        break;
                    }
                },
            }
        }

        log::info!("Refresh coordinator stopped");
    }
}
