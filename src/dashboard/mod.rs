//! Presentation boundary - refresh passes, retained display state, snapshots
//!
//! ```text
//! timer tick / RefreshMessage ──► RefreshCoordinator::spawn_pass
//!                                        │ (tokio::spawn)
//!                                        ▼
//!                 run_pass: EventStore fetch → build_report
//!                                        │
//!                                        ▼
//!                DisplayState::apply (RwLock, last write wins)
//!                                        │
//!                                        ▼
//!                  persistence_task → snapshot JSON on disk
//! ```

pub mod refresh;
pub mod report;
pub mod snapshot;

pub use refresh::{ApplyOutcome, DisplaySnapshot, DisplayState, NowFn, RefreshCoordinator, RefreshMessage, SharedDisplay};
pub use report::{
    build_report, fetch_input, fetch_lower_bound, run_pass, ConversionRow, DashboardReport, NamedFunnel, Overview, PassInput,
};
pub use snapshot::{load_snapshot, persistence_task, save_snapshot};
