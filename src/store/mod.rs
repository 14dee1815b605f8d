//! Event Store Access - adapter boundary in front of the shared datastore
//!
//! The dashboard never aggregates inside the database. A refresh pass asks
//! an [`EventStore`] for every row since the range's lower bound, then hands
//! the materialized snapshot to the engine.
//!
//! Implementations:
//! - [`SqliteEventStore`] - read-only rusqlite connection over the schema in `sql/`
//! - [`MemoryEventStore`] - fixed in-memory rows, for tests and demos

pub mod memory;
pub mod sqlite;

pub use memory::MemoryEventStore;
pub use sqlite::{apply_schema, SqliteEventStore};

use crate::engine::{ChatMessage, ChatSession, Offering, Promotion, RawEvent, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Unavailable(e) => write!(f, "Store unavailable: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Event fetch parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    /// Inclusive lower bound
    pub since: DateTime<Utc>,
    /// Only these event names; `None` fetches every name
    pub names: Option<Vec<String>>,
    pub order: SortOrder,
}

impl EventQuery {
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since,
            names: None,
            order: SortOrder::Ascending,
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }
}

/// Reference rows used for per-store join counts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventorySnapshot {
    pub stores: Vec<Store>,
    pub promotions: Vec<Promotion>,
    pub offerings: Vec<Offering>,
}

/// Read access to the event datastore
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Event rows matching `query`, ordered by timestamp
    async fn fetch_events(&self, query: &EventQuery) -> Result<Vec<RawEvent>, StoreError>;

    /// Chat sessions created at or after `since`, oldest first
    async fn fetch_sessions(&self, since: DateTime<Utc>) -> Result<Vec<ChatSession>, StoreError>;

    /// Chat messages created at or after `since`, oldest first
    async fn fetch_messages(&self, since: DateTime<Utc>) -> Result<Vec<ChatMessage>, StoreError>;

    async fn fetch_inventory(&self) -> Result<InventorySnapshot, StoreError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}
