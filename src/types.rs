use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type (nanoseconds since logger construction).
pub type Timestamp = u64;

/// Wire identifier of a declared series.
pub type SeriesId = u16;

/// Identifier given to the first series declared after construction or `clear`.
/// Zero is reserved: it marks a declaration record in the binary stream.
pub const FIRST_SERIES_ID: SeriesId = 1;

/// Kind of value a series accepts. Fixed for the life of the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Numeric,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Numeric => f.write_str("numeric"),
            ValueKind::Text => f.write_str("text"),
        }
    }
}

/// A single logged value.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Numeric(f64),
    Text(String),
}

impl Payload {
    /// The kind a series must have to accept this payload.
    pub fn kind(&self) -> ValueKind {
        match self {
            Payload::Numeric(_) => ValueKind::Numeric,
            Payload::Text(_) => ValueKind::Text,
        }
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Numeric(v)
    }
}

impl From<f32> for Payload {
    fn from(v: f32) -> Self {
        Payload::Numeric(f64::from(v))
    }
}

impl From<String> for Payload {
    fn from(v: String) -> Self {
        Payload::Text(v)
    }
}

impl From<&str> for Payload {
    fn from(v: &str) -> Self {
        Payload::Text(v.to_string())
    }
}

/// Metadata of one declared series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesDescriptor {
    pub id: SeriesId,
    pub name: String,
    pub unit: String,
    pub kind: ValueKind,
    /// Elapsed nanoseconds at declaration time.
    pub registered_at: Timestamp,
}

/// A value that passed validation, ready to be encoded or buffered.
///
/// The series id is captured when the value is accepted so the record can be
/// encoded without consulting the registry later on.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedValue {
    pub series: String,
    pub series_id: SeriesId,
    pub timestamp: Timestamp,
    pub payload: Payload,
}
