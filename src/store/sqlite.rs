//! SQLite-backed event store
//!
//! Opens the shared database read-only (`query_only`) and maps rows into
//! engine records. Timestamps are unix milliseconds; `properties` is JSON
//! text. Rows that cannot be represented are skipped here or dropped later
//! by `normalize_events`; a bad row never fails the fetch.

use super::{EventQuery, EventStore, InventorySnapshot, SortOrder, StoreError};
use crate::engine::{ChatMessage, ChatSession, MessageRole, Offering, Promotion, Properties, RawEvent, Store};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: [(&str, &str); 3] = [
    ("01_events.sql", include_str!("../../sql/01_events.sql")),
    ("02_chat.sql", include_str!("../../sql/02_chat.sql")),
    ("03_stores.sql", include_str!("../../sql/03_stores.sql")),
];

/// Create the dashboard tables if they do not exist
///
/// Every statement uses `IF NOT EXISTS`, so this is idempotent.
pub fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    for (name, sql) in SCHEMA {
        log::debug!("   ├─ Executing: {}", name);
        conn.execute_batch(sql)?;
    }
    Ok(())
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

// Column affinity is not enforced by SQLite, so every column is read by its
// actual storage class and a value of the wrong class becomes `None`.

fn int_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<i64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => Some(i),
        _ => None,
    })
}

fn real_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<f64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        _ => None,
    })
}

/// Text column; integers and reals are stringified
fn text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().map(str::to_string),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    })
}

pub struct SqliteEventStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEventStore {
    /// Open an existing database for reading
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path.as_ref())?;

        apply_optimized_pragmas(&conn)?;

        // Enable read-only mode to prevent write locks (must be after PRAGMAs)
        conn.execute_batch("PRAGMA query_only = ON")?;

        log::info!("📥 SQLite event store opened: {}", db_path.as_ref().display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
        f(&conn)
    }
}

fn query_events(conn: &Connection, query: &EventQuery) -> Result<Vec<RawEvent>, StoreError> {
    let mut sql = String::from(
        "SELECT timestamp_ms, user_id, name, platform, properties
         FROM events
         WHERE timestamp_ms >= ?1",
    );
    let mut values = vec![Value::Integer(query.since.timestamp_millis())];

    if let Some(names) = &query.names {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (0..names.len()).map(|i| format!("?{}", i + 2)).collect();
        sql.push_str(&format!(" AND name IN ({})", placeholders.join(", ")));
        values.extend(names.iter().map(|n| Value::Text(n.clone())));
    }

    sql.push_str(match query.order {
        SortOrder::Ascending => " ORDER BY timestamp_ms ASC, id ASC",
        SortOrder::Descending => " ORDER BY timestamp_ms DESC, id DESC",
    });

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        let Some(name) = text_column(row, 2)? else {
            return Ok(None);
        };
        let properties = match row.get_ref(4)? {
            ValueRef::Text(bytes) => std::str::from_utf8(bytes).map(Properties::from_json).unwrap_or_default(),
            _ => Properties::new(),
        };
        Ok(Some(RawEvent {
            timestamp: int_column(row, 0)?.and_then(from_millis),
            user_id: text_column(row, 1)?,
            name,
            platform: text_column(row, 3)?,
            properties,
        }))
    })?;

    let mut events = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        match row? {
            Some(event) => events.push(event),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        log::debug!("Skipped {} event rows without a readable name", skipped);
    }

    log::debug!("📥 Fetched {} event rows since {}", events.len(), query.since);
    Ok(events)
}

fn query_sessions(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<ChatSession>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT created_at_ms, user_id, state
         FROM chat_sessions
         WHERE created_at_ms >= ?1
         ORDER BY created_at_ms ASC, id ASC",
    )?;

    let rows = stmt.query_map([since.timestamp_millis()], |row| {
        Ok((int_column(row, 0)?, text_column(row, 1)?, text_column(row, 2)?))
    })?;

    let mut sessions = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        match row? {
            (Some(created_ms), Some(user_id), Some(state)) => match from_millis(created_ms) {
                Some(created_at) => sessions.push(ChatSession {
                    created_at,
                    user_id,
                    state,
                }),
                None => skipped += 1,
            },
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        log::debug!("Skipped {} malformed chat sessions", skipped);
    }
    Ok(sessions)
}

fn query_messages(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<ChatMessage>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT created_at_ms, user_id, role, response_type, processing_ms
         FROM chat_messages
         WHERE created_at_ms >= ?1
         ORDER BY created_at_ms ASC, id ASC",
    )?;

    let rows = stmt.query_map([since.timestamp_millis()], |row| {
        Ok((
            int_column(row, 0)?,
            text_column(row, 1)?,
            text_column(row, 2)?,
            text_column(row, 3)?,
            real_column(row, 4)?,
        ))
    })?;

    let mut messages = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        let (created_ms, user_id, role, response_type, processing_ms) = row?;
        let created_at = created_ms.and_then(from_millis);
        let role = role.as_deref().and_then(MessageRole::from_str);
        match (created_at, role) {
            (Some(created_at), Some(role)) => messages.push(ChatMessage {
                created_at,
                user_id,
                role,
                response_type,
                processing_ms,
            }),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        log::debug!("Skipped {} chat messages with unknown role or bad timestamp", skipped);
    }
    Ok(messages)
}

fn query_inventory(conn: &Connection) -> Result<InventorySnapshot, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name FROM stores ORDER BY id ASC")?;
    let stores = stmt
        .query_map([], |row| Ok(Store { id: row.get(0)?, name: row.get(1)? }))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare("SELECT id, store_id FROM promotions ORDER BY id ASC")?;
    let promotions = stmt
        .query_map([], |row| Ok(Promotion { id: row.get(0)?, store_id: row.get(1)? }))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare("SELECT id, store_id FROM offerings ORDER BY id ASC")?;
    let offerings = stmt
        .query_map([], |row| Ok(Offering { id: row.get(0)?, store_id: row.get(1)? }))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InventorySnapshot {
        stores,
        promotions,
        offerings,
    })
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn fetch_events(&self, query: &EventQuery) -> Result<Vec<RawEvent>, StoreError> {
        self.with_conn(|conn| query_events(conn, query))
    }

    async fn fetch_sessions(&self, since: DateTime<Utc>) -> Result<Vec<ChatSession>, StoreError> {
        self.with_conn(|conn| query_sessions(conn, since))
    }

    async fn fetch_messages(&self, since: DateTime<Utc>) -> Result<Vec<ChatMessage>, StoreError> {
        self.with_conn(|conn| query_messages(conn, since))
    }

    async fn fetch_inventory(&self) -> Result<InventorySnapshot, StoreError> {
        self.with_conn(query_inventory)
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}
