//! Aggregation Engine - pure metric derivation over event snapshots
//!
//! Every function here takes an already-fetched slice of records plus
//! explicit window or configuration parameters and returns new derived
//! structures. Nothing reads the clock or touches storage; callers pass
//! `now` in.
//!
//! # Architecture
//!
//! ```text
//! EventStore (RawEvent rows) → normalize_events → &[Event]
//!     ↓
//! window_filter / TimeRange::lower_bound
//!     ↓
//! bucket_by_day · bucket_by_week · event_breakdown · build_funnel
//! cohort_retention · segment_users · percentiles · classify_new_vs_returning
//!     ↓
//! Serializable rows (DailyBucket, FunnelStep, CohortRow, Segment, LatencyRow)
//! ```

pub mod breakdown;
pub mod buckets;
pub mod classify;
pub mod cohort;
pub mod conversion;
pub mod funnel;
pub mod inventory;
pub mod latency;
pub mod segment;
pub mod types;
pub mod window;

pub use breakdown::{event_breakdown, feature_adoption, platform_breakdown, top_users, EventCount, FeatureAdoption, UserActivity};
pub use buckets::{active_users, bucket_by_day, bucket_by_week, last_n_buckets, ActiveUsers, DailyBucket, WeeklyBucket};
pub use classify::{classify_new_vs_returning, NewVsReturning, UserOrigin};
pub use cohort::{cohort_retention, CheckpointRetention, CohortRow};
pub use conversion::{conversion_rate, distinct_users, percent, users_with_event};
pub use funnel::{build_funnel, session_stage_funnel, Funnel, FunnelStep};
pub use inventory::{store_inventory, StoreInventory};
pub use latency::{latency_by_category, percentiles, LatencyRow, PercentileSummary};
pub use segment::{segment_users, Segment};
pub use types::{
    normalize_events, ChatMessage, ChatSession, Event, MessageRole, Offering, PropValue, Promotion, Properties, RawEvent, RecordError, Store,
};
pub use window::{window_filter, week_start, TimeRange, Timestamped};
