use crate::phone::validate_e164;
use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::warn;

pub mod storage;

pub use storage::CallHistoryService;

pub const MAX_CALL_HISTORY: usize = 100;
pub const STATUS_MISSED: &str = "missed";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Incoming,
    #[default]
    Outgoing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Provider call session id. Only incoming records carry a reliable one.
    #[serde(
        rename = "call_sid",
        alias = "call_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub call_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub number: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Anything other than `incoming` was logged by the client as outgoing.
    #[serde(default, deserialize_with = "deserialize_direction")]
    pub direction: CallDirection,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub duration: u64,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub timestamp: String,
    /// Client-supplied fields this service does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CallRecord {
    pub fn incoming(call_id: String, number: String, name: Option<String>) -> Self {
        Self {
            call_id: Some(call_id),
            number,
            name,
            direction: CallDirection::Incoming,
            status: STATUS_MISSED.to_string(),
            duration: 0,
            timestamp: now_timestamp(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Browsers report durations as JSON numbers that may carry a fraction, or
/// occasionally as strings.
pub(crate) fn deserialize_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let seconds = match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0).round() as u64))
            .unwrap_or(0),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(|f| f.max(0.0).round() as u64)
            .unwrap_or(0),
        _ => 0,
    };
    Ok(seconds)
}

/// `null` reads as an empty string.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_direction<'de, D>(deserializer: D) -> Result<CallDirection, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if s == "incoming" => CallDirection::Incoming,
        _ => CallDirection::Outgoing,
    })
}

pub fn now_timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Millis, false)
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Use /api/update-call-history for incoming calls")]
    IncomingNotAllowed,
    #[error("Invalid phone number format: {0}")]
    InvalidNumber(String),
    #[error("Call not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    record: CallRecord,
}

/// Call history, newest first, bounded to [`MAX_CALL_HISTORY`] entries.
///
/// Entries are only ever pushed at the front and dropped at the back, so
/// their sequence numbers stay contiguous and a sequence number maps to a
/// position without scanning. `index` remembers the newest entry for each
/// incoming call id; outgoing records are never updated.
#[derive(Debug, Clone, Default)]
pub struct CallHistory {
    entries: VecDeque<Entry>,
    index: HashMap<String, u64>,
    next_seq: u64,
}

impl CallHistory {
    pub fn from_records(records: Vec<CallRecord>) -> Self {
        let mut history = Self::default();
        for record in records.into_iter().take(MAX_CALL_HISTORY).rev() {
            history.push_front(record);
        }
        history
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn get(&self, position: usize) -> Option<&CallRecord> {
        self.entries.get(position).map(|e| &e.record)
    }

    pub fn find(&self, call_id: &str) -> Option<&CallRecord> {
        let position = self.position_of(call_id)?;
        self.get(position)
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.iter().cloned().collect()
    }

    /// Adds a client-reported outgoing call.
    pub fn record_outgoing(
        &mut self,
        mut entry: CallRecord,
    ) -> Result<&CallRecord, HistoryError> {
        if entry.direction == CallDirection::Incoming {
            return Err(HistoryError::IncomingNotAllowed);
        }
        entry.number = validate_e164(&entry.number)
            .ok_or_else(|| HistoryError::InvalidNumber(entry.number.clone()))?;
        entry.timestamp = now_timestamp();
        Ok(self.push_front(entry))
    }

    /// Adds an incoming call as missed; [`CallHistory::update_outcome`]
    /// corrects it once the client reports how the call ended.
    pub fn record_incoming(
        &mut self,
        call_id: String,
        number: String,
        name: Option<String>,
    ) -> Result<&CallRecord, HistoryError> {
        let number = validate_e164(&number).ok_or(HistoryError::InvalidNumber(number))?;
        Ok(self.push_front(CallRecord::incoming(call_id, number, name)))
    }

    pub fn update_outcome(
        &mut self,
        call_id: &str,
        status: String,
        duration: u64,
    ) -> Result<&CallRecord, HistoryError> {
        let position = self
            .position_of(call_id)
            .ok_or_else(|| HistoryError::NotFound(call_id.to_string()))?;
        let entry = &mut self.entries[position];
        entry.record.status = status;
        entry.record.duration = duration;
        Ok(&entry.record)
    }

    fn push_front(&mut self, record: CallRecord) -> &CallRecord {
        let seq = self.next_seq;
        self.next_seq += 1;
        if record.direction == CallDirection::Incoming {
            if let Some(call_id) = record.call_id.as_ref() {
                self.index.insert(call_id.clone(), seq);
            }
        }
        self.entries.push_front(Entry { seq, record });
        while self.entries.len() > MAX_CALL_HISTORY {
            if let Some(dropped) = self.entries.pop_back() {
                if let Some(call_id) = dropped.record.call_id.as_ref() {
                    if self.index.get(call_id) == Some(&dropped.seq) {
                        self.index.remove(call_id);
                    }
                }
            }
        }
        &self.entries[0].record
    }

    fn position_of(&self, call_id: &str) -> Option<usize> {
        let seq = *self.index.get(call_id)?;
        let position = (self.next_seq - 1 - seq) as usize;
        match self.entries.get(position) {
            Some(entry) if entry.seq == seq => Some(position),
            _ => None,
        }
    }
}

impl Serialize for CallHistory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for CallHistory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
        let records = values
            .into_iter()
            .enumerate()
            .filter_map(|(position, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(position, "skipping unreadable call history record: {}", e);
                    None
                }
            })
            .collect();
        Ok(Self::from_records(records))
    }
}
