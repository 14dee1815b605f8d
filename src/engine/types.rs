//! Record types consumed by the aggregation engine
//!
//! Rows arrive from the store as [`RawEvent`]s. Only rows carrying both a
//! timestamp and a user id become [`Event`]s; everything else about a record
//! is optional and read through the typed [`Properties`] helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar value stored in an event's property map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Open string -> scalar mapping attached to an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropValue>);

impl Properties {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parse the JSON text stored in the `properties` column.
    ///
    /// Anything that is not a JSON object of scalars yields an empty map;
    /// non-scalar values inside an object are skipped.
    pub fn from_json(text: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("Ignoring unparseable properties ({}): {}", e, text);
                return Self::new();
            }
        };

        let mut map = BTreeMap::new();
        if let serde_json::Value::Object(obj) = value {
            for (key, v) in obj {
                let prop = match v {
                    serde_json::Value::Bool(b) => PropValue::Bool(b),
                    serde_json::Value::Number(n) => match n.as_f64() {
                        Some(f) => PropValue::Number(f),
                        None => continue,
                    },
                    serde_json::Value::String(s) => PropValue::Text(s),
                    _ => continue,
                };
                map.insert(key, prop);
            }
        }
        Self(map)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    /// Numeric property, or `default` when absent or non-numeric.
    ///
    /// Numeric text (`"12.5"`) is accepted.
    pub fn get_number(&self, key: &str, default: f64) -> f64 {
        match self.0.get(key) {
            Some(PropValue::Number(n)) if n.is_finite() => *n,
            Some(PropValue::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(default),
            _ => default,
        }
    }

    /// Boolean property. `None` when absent or not a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(PropValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(PropValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Validated product event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub name: String,
    pub platform: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            timestamp,
            user_id: user_id.into(),
            name: name.into(),
            platform: None,
            properties: Properties::new(),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: PropValue) -> Self {
        self.properties.insert(key, value);
        self
    }
}

/// Event row as read from the store, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub timestamp: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub name: String,
    pub platform: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

/// Reason a raw record was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    MissingTimestamp,
    MissingUserId,
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::MissingTimestamp => write!(f, "record has no timestamp"),
            RecordError::MissingUserId => write!(f, "record has no user id"),
        }
    }
}

impl std::error::Error for RecordError {}

impl TryFrom<RawEvent> for Event {
    type Error = RecordError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let timestamp = raw.timestamp.ok_or(RecordError::MissingTimestamp)?;
        let user_id = raw
            .user_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(RecordError::MissingUserId)?;

        Ok(Event {
            timestamp,
            user_id,
            name: raw.name,
            platform: raw.platform.filter(|p| !p.trim().is_empty()),
            properties: raw.properties,
        })
    }
}

/// Validate raw rows, dropping any without a timestamp or user id.
///
/// A malformed row never fails the pass; the remaining rows are returned in
/// their original order.
pub fn normalize_events(raw: Vec<RawEvent>) -> Vec<Event> {
    let total = raw.len();
    let events: Vec<Event> = raw
        .into_iter()
        .filter_map(|r| match Event::try_from(r) {
            Ok(event) => Some(event),
            Err(e) => {
                log::debug!("Dropping malformed event: {}", e);
                None
            }
        })
        .collect();

    let dropped = total - events.len();
    if dropped > 0 {
        log::warn!("⚠️  Dropped {} of {} malformed event rows", dropped, total);
    }
    events
}

/// Chat session with its current funnel stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub role: MessageRole,
    pub response_type: Option<String>,
    pub processing_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: i64,
    pub store_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub id: i64,
    pub store_id: i64,
}
