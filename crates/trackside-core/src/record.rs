//! Raw and normalized telemetry records

use std::collections::HashMap;
use std::fmt;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

/// Timestamp format written to and read from session logs
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// An untyped scalar as received on the wire or read from a log row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Integer number
    Int(i64),
    /// Floating point number
    Float(f64),
    /// String, also every cell read back from a log
    Text(String),
}

impl RawValue {
    /// Interpret as floating point
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(v) => Some(*v as f64),
            RawValue::Float(v) => Some(*v),
            RawValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Interpret as an integer
    ///
    /// Floats are truncated toward zero. Text must be an integer literal.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Int(v) => Some(*v),
            RawValue::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            RawValue::Float(_) => None,
            RawValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Borrow the text form, if this value is text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value, ignoring anything that is not a scalar
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(RawValue::Int)
                .or_else(|| n.as_f64().map(RawValue::Float)),
            serde_json::Value::String(s) => Some(RawValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Int(v) => write!(f, "{}", v),
            RawValue::Float(v) => write!(f, "{}", v),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Float(v)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

/// One inbound record: field name to raw scalar
///
/// Every field is independently present or absent.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// When the record was received (live) or originally logged (replay)
    pub timestamp: NaiveDateTime,
    fields: HashMap<String, RawValue>,
}

impl RawRecord {
    /// Create an empty record stamped with the current local time
    pub fn new() -> Self {
        Self::at(Local::now().naive_local())
    }

    /// Create an empty record with an explicit timestamp
    pub fn at(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            fields: HashMap::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Get a field
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    /// Check whether a field is present
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over all fields
    pub fn fields(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a UTF-8 JSON object payload
    ///
    /// Non-scalar members are skipped. Anything other than an object is an
    /// error.
    pub fn from_json_slice(
        payload: &[u8],
        timestamp: NaiveDateTime,
    ) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(payload).map_err(|_| PayloadError::NotUtf8)?;
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| PayloadError::Json(e.to_string()))?;
        let object = match value {
            serde_json::Value::Object(map) => map,
            _ => return Err(PayloadError::NotAnObject),
        };

        let mut record = Self::at(timestamp);
        for (name, value) in &object {
            if let Some(raw) = RawValue::from_json(value) {
                record.fields.insert(name.clone(), raw);
            }
        }
        Ok(record)
    }
}

impl Default for RawRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Reason an inbound payload could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("payload is not valid JSON: {0}")]
    Json(String),

    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// A decoded value for one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelValue {
    /// Channel name
    pub channel: &'static str,
    /// Physical value
    pub value: f64,
}

/// A decoded record: channel name to physical value
///
/// Values are kept in catalog order. Immutable once built by the decoder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    /// Ingestion timestamp
    pub timestamp: NaiveDateTime,
    values: Vec<ChannelValue>,
}

impl NormalizedRecord {
    pub(crate) fn new(timestamp: NaiveDateTime, values: Vec<ChannelValue>) -> Self {
        Self { timestamp, values }
    }

    /// Value of a channel, if present in this record
    pub fn get(&self, channel: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|v| v.channel == channel)
            .map(|v| v.value)
    }

    /// Check whether a channel is present
    pub fn contains(&self, channel: &str) -> bool {
        self.values.iter().any(|v| v.channel == channel)
    }

    /// All present channel values in catalog order
    pub fn values(&self) -> &[ChannelValue] {
        &self.values
    }

    /// Number of present channels
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no channel was decoded
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Timestamp formatted for the session log
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}
