use crate::encoding::OutputMode;
use crate::sink::SinkSlot;
use crate::types::{SeriesId, ValueKind};

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Diagnostic channel of the logger.
///
/// This crate is a library; it never prints on its own. Every rejected call and
/// every sink lifecycle change is reported here, and hosts decide where it goes.
/// The default listener forwards to `tracing`.
pub trait LoggerEventListener: std::fmt::Debug + Send + Sync + 'static {
    fn on_event(&self, event: LoggerEvent);
}

/// Structured events emitted by the logger.
#[derive(Debug, Clone, PartialEq)]
pub enum LoggerEvent {
    SeriesDeclared { name: String, id: SeriesId, kind: ValueKind },
    DeclarationRejected { name: String, error: String },
    ValueRejected { series: String, error: String },

    SinkAttached { slot: SinkSlot, mode: OutputMode, path: Option<PathBuf> },
    SinkAttachFailed { slot: SinkSlot, path: Option<PathBuf>, error: String },
    SinkDetached { slot: SinkSlot },
    SinkWriteFailed { slot: SinkSlot, error: String },

    BufferDrained { slot: SinkSlot, values: usize },
    Cleared { discarded_values: usize, detached_sinks: bool },
}

#[derive(Debug)]
pub struct NoopEventListener;

impl LoggerEventListener for NoopEventListener {
    #[inline]
    fn on_event(&self, _event: LoggerEvent) {}
}

pub fn noop_event_listener() -> Arc<dyn LoggerEventListener> {
    Arc::new(NoopEventListener)
}

/// Forwards events to `tracing`: failures at warn level, lifecycle at debug.
#[derive(Debug)]
pub struct TracingEventListener;

impl LoggerEventListener for TracingEventListener {
    fn on_event(&self, event: LoggerEvent) {
        match event {
            LoggerEvent::SeriesDeclared { name, id, kind } => {
                tracing::debug!(series = %name, id, %kind, "series declared");
            }
            LoggerEvent::DeclarationRejected { name, error } => {
                tracing::warn!(series = %name, %error, "declaration rejected");
            }
            LoggerEvent::ValueRejected { series, error } => {
                tracing::warn!(series = %series, %error, "value rejected");
            }
            LoggerEvent::SinkAttached { slot, mode, path } => {
                tracing::debug!(%slot, ?mode, ?path, "sink attached");
            }
            LoggerEvent::SinkAttachFailed { slot, path, error } => {
                tracing::warn!(%slot, ?path, %error, "sink attach failed");
            }
            LoggerEvent::SinkDetached { slot } => {
                tracing::debug!(%slot, "sink detached");
            }
            LoggerEvent::SinkWriteFailed { slot, error } => {
                tracing::warn!(%slot, %error, "sink write failed");
            }
            LoggerEvent::BufferDrained { slot, values } => {
                tracing::debug!(%slot, values, "buffer drained");
            }
            LoggerEvent::Cleared { discarded_values, detached_sinks } => {
                tracing::debug!(discarded_values, detached_sinks, "registry cleared");
            }
        }
    }
}

pub fn tracing_event_listener() -> Arc<dyn LoggerEventListener> {
    Arc::new(TracingEventListener)
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingEventListener {
    events: Mutex<Vec<LoggerEvent>>,
}

impl RecordingEventListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LoggerEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LoggerEventListener for RecordingEventListener {
    fn on_event(&self, event: LoggerEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

/// Counters describing logger activity.
///
/// Emitting is a no-op until the host installs a `metrics` recorder.
pub mod logger_metrics {
    use ::metrics::{describe_counter, Unit};

    // Counters are exposed as `<name>_total` by the Prometheus exporter.
    pub const SERIES_DECLARED: &str = "tellog_series_declared";
    pub const VALUES_LOGGED: &str = "tellog_values_logged";
    pub const VALUES_BUFFERED: &str = "tellog_values_buffered";
    pub const VALUES_REJECTED: &str = "tellog_values_rejected";
    pub const BYTES_WRITTEN: &str = "tellog_bytes_written";

    #[inline]
    pub fn record_series_declared() {
        ::metrics::counter!(SERIES_DECLARED).increment(1);
    }

    #[inline]
    pub fn record_value_logged(buffered: bool) {
        ::metrics::counter!(VALUES_LOGGED).increment(1);
        if buffered {
            ::metrics::counter!(VALUES_BUFFERED).increment(1);
        }
    }

    #[inline]
    pub fn record_value_rejected() {
        ::metrics::counter!(VALUES_REJECTED).increment(1);
    }

    #[inline]
    pub fn record_bytes_written(sink: &'static str, bytes: usize) {
        if bytes > 0 {
            ::metrics::counter!(BYTES_WRITTEN, "sink" => sink).increment(bytes as u64);
        }
    }

    /// Registers descriptions for every counter with the installed recorder.
    pub fn describe_all() {
        describe_counter!(SERIES_DECLARED, Unit::Count, "Series successfully declared.");
        describe_counter!(
            VALUES_LOGGED,
            Unit::Count,
            "Values accepted by log/log_static, whether written or buffered."
        );
        describe_counter!(
            VALUES_BUFFERED,
            Unit::Count,
            "Values staged in the buffer because no sink was attached."
        );
        describe_counter!(
            VALUES_REJECTED,
            Unit::Count,
            "Values dropped for an undeclared series or a kind mismatch."
        );
        describe_counter!(
            BYTES_WRITTEN,
            Unit::Bytes,
            "Encoded bytes handed to sinks, labelled by sink."
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_listener_keeps_order() {
        let listener = RecordingEventListener::new();
        listener.on_event(LoggerEvent::SinkDetached { slot: SinkSlot::File });
        listener.on_event(LoggerEvent::BufferDrained { slot: SinkSlot::Console, values: 3 });

        assert_eq!(
            listener.events(),
            vec![
                LoggerEvent::SinkDetached { slot: SinkSlot::File },
                LoggerEvent::BufferDrained { slot: SinkSlot::Console, values: 3 },
            ]
        );
    }

    #[test]
    fn test_listeners_accept_every_event_without_subscriber() {
        let listeners: Vec<Arc<dyn LoggerEventListener>> =
            vec![noop_event_listener(), tracing_event_listener()];
        for l in listeners {
            l.on_event(LoggerEvent::ValueRejected {
                series: "status".to_string(),
                error: "kind mismatch".to_string(),
            });
            l.on_event(LoggerEvent::Cleared { discarded_values: 2, detached_sinks: false });
        }
    }

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        logger_metrics::describe_all();
        logger_metrics::record_series_declared();
        logger_metrics::record_value_logged(true);
        logger_metrics::record_value_rejected();
        logger_metrics::record_bytes_written("file", 18);
    }
}
