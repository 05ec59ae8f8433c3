use crate::types::ValueKind;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for telemetry logger operations.
///
/// Every variant is recoverable: the call that produced it is a no-op and the
/// logger stays usable.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Series '{0}' already declared")]
    AlreadyDeclared(String),

    #[error("Series '{0}' not declared")]
    NotDeclared(String),

    #[error("Series '{series}' expects {expected} values, got {found}")]
    TypeMismatch {
        series: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// Text payloads carry a u32 length on the wire.
    #[error("Value for series '{series}' is {len} bytes, larger than a record can hold")]
    PayloadTooLarge { series: String, len: usize },

    #[error("Could not open {} for writing: {source}", .path.display())]
    SinkOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write to {sink} sink failed: {source}")]
    SinkWriteFailed {
        sink: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid series name: {0}")]
    InvalidSeriesName(String),

    /// The 16-bit id space is exhausted; `clear` resets it.
    #[error("Series limit reached: no identifier left for '{0}'")]
    SeriesLimitReached(String),

    #[error("Decode error at byte {offset}: {details}")]
    Decode { offset: usize, details: String },
}
