#![doc = include_str!("../README.md")]

pub mod buffer;
pub mod clock;
pub mod core;
pub mod encoding;
pub mod error;
pub mod reader;
pub mod registry;
pub mod sink;
pub mod telemetry;
pub mod types;

/// Behaviour of `clear` towards buffered values and sinks.
pub use crate::core::ClearPolicy;
/// Configuration options for the logger.
pub use crate::core::LoggerConfig;
/// Main entry point: declare series, log values, attach sinks.
pub use crate::core::TelemetryLogger;
/// Readable or binary rendering of records.
pub use crate::encoding::OutputMode;
/// Error type for logger operations.
pub use crate::error::TelemetryError;
/// Decoder for binary record streams.
pub use crate::reader::{Record, RecordReader};
/// Output sink capability and its console/file implementations.
pub use crate::sink::{ByteSink, ConsoleSink, FileSink, SharedBuffer};
/// Structured event hook for diagnostics.
pub use crate::telemetry::{LoggerEvent, LoggerEventListener};
/// Core data model.
pub use crate::types::{
    LoggedValue, Payload, SeriesDescriptor, SeriesId, Timestamp, ValueKind, FIRST_SERIES_ID,
};

/// Record name used when the configuration does not set one.
pub const DEFAULT_RECORD_NAME: &str = "logs";
