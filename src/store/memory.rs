//! In-memory event store over fixed rows

use super::{EventQuery, EventStore, InventorySnapshot, SortOrder, StoreError};
use crate::engine::{ChatMessage, ChatSession, RawEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Serves queries from rows held in memory, applying the same filtering and
/// ordering contract as the SQLite store
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    pub events: Vec<RawEvent>,
    pub sessions: Vec<ChatSession>,
    pub messages: Vec<ChatMessage>,
    pub inventory: InventorySnapshot,
}

impl MemoryEventStore {
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn fetch_events(&self, query: &EventQuery) -> Result<Vec<RawEvent>, StoreError> {
        // Rows without a timestamp never satisfy the lower bound, as in SQL
        let mut rows: Vec<RawEvent> = self
            .events
            .iter()
            .filter(|e| e.timestamp.map_or(false, |t| t >= query.since))
            .filter(|e| query.names.as_ref().map_or(true, |names| names.contains(&e.name)))
            .cloned()
            .collect();

        rows.sort_by_key(|e| e.timestamp);
        if query.order == SortOrder::Descending {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn fetch_sessions(&self, since: DateTime<Utc>) -> Result<Vec<ChatSession>, StoreError> {
        let mut rows: Vec<ChatSession> = self.sessions.iter().filter(|s| s.created_at >= since).cloned().collect();
        rows.sort_by_key(|s| s.created_at);
        Ok(rows)
    }

    async fn fetch_messages(&self, since: DateTime<Utc>) -> Result<Vec<ChatMessage>, StoreError> {
        let mut rows: Vec<ChatMessage> = self.messages.iter().filter(|m| m.created_at >= since).cloned().collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    async fn fetch_inventory(&self) -> Result<InventorySnapshot, StoreError> {
        Ok(self.inventory.clone())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
