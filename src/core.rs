//! Core logger: the facade that owns the registry, the value buffer and the sink bindings.

use crate::buffer::ValueBuffer;
use crate::clock::{duration_to_nanos, Clock, MonotonicClock};
use crate::encoding::{encode_declaration, encode_value, OutputMode};
use crate::error::TelemetryError;
use crate::registry::SeriesRegistry;
use crate::sink::{ByteSink, ConsoleSink, FileSink, SinkBinding, SinkSlot};
use crate::telemetry::{logger_metrics, tracing_event_listener, LoggerEvent, LoggerEventListener};
use crate::types::{LoggedValue, Payload, SeriesDescriptor, Timestamp, ValueKind};

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// What `clear` does besides dropping every series declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearPolicy {
    /// Discard values still waiting in the buffer.
    pub discard_buffer: bool,
    /// Detach (and close) the console and file sinks.
    pub detach_sinks: bool,
}

impl Default for ClearPolicy {
    fn default() -> Self {
        ClearPolicy {
            discard_buffer: true,
            detach_sinks: false,
        }
    }
}

/// Configuration options for the TelemetryLogger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Name of the recording, for hosts that label their output.
    pub record_name: String,
    /// Behaviour of `clear` towards buffered values and attached sinks.
    pub clear_policy: ClearPolicy,
    /// Diagnostic channel for rejected calls and sink lifecycle events.
    pub event_listener: Arc<dyn LoggerEventListener>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            record_name: crate::DEFAULT_RECORD_NAME.to_string(),
            clear_policy: ClearPolicy::default(),
            event_listener: tracing_event_listener(),
        }
    }
}

/// In-process telemetry recorder.
///
/// Values logged while no sink is attached are buffered; the first sink attached
/// afterwards receives every declaration followed by the buffered values, and
/// from then on values go straight to the attached sinks.
///
/// All operations run to completion on the calling thread. Share a logger
/// across threads by wrapping it in a `Mutex`.
#[derive(Debug)]
pub struct TelemetryLogger {
    registry: SeriesRegistry,
    buffer: ValueBuffer,
    console: Option<SinkBinding>,
    file: Option<SinkBinding>,
    file_path: Option<PathBuf>,
    clock: Box<dyn Clock>,
    config: LoggerConfig,
}

impl Default for TelemetryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryLogger {
    /// Creates a logger with the default configuration. Time starts now.
    pub fn new() -> Self {
        Self::with_config(LoggerConfig::default())
    }

    pub fn with_config(config: LoggerConfig) -> Self {
        Self::with_clock(config, Box::new(MonotonicClock::start()))
    }

    /// Creates a logger reading time from `clock` instead of the system monotonic clock.
    pub fn with_clock(config: LoggerConfig, clock: Box<dyn Clock>) -> Self {
        TelemetryLogger {
            registry: SeriesRegistry::default(),
            buffer: ValueBuffer::default(),
            console: None,
            file: None,
            file_path: None,
            clock,
            config,
        }
    }

    /// Declares a new series and forwards its declaration to the attached sinks.
    ///
    /// # Errors
    /// `AlreadyDeclared` if `name` is taken; `InvalidSeriesName` or
    /// `SeriesLimitReached` if no valid declaration can be made. The registry
    /// is left unchanged in every case.
    pub fn declare(&mut self, name: &str, unit: &str, kind: ValueKind) -> Result<(), TelemetryError> {
        let registered_at = self.now();
        let descriptor = match self.registry.declare(name, unit, kind, registered_at) {
            Ok(d) => d,
            Err(e) => {
                self.emit(LoggerEvent::DeclarationRejected {
                    name: name.to_string(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };
        logger_metrics::record_series_declared();
        self.emit(LoggerEvent::SeriesDeclared {
            name: descriptor.name.clone(),
            id: descriptor.id,
            kind,
        });

        self.write_to_active(|mode, buf| encode_declaration(&descriptor, mode, buf));
        Ok(())
    }

    /// Logs a value stamped with the time elapsed since the logger was created.
    pub fn log(&mut self, name: &str, value: impl Into<Payload>) -> Result<(), TelemetryError> {
        let timestamp = self.now();
        self.record(name, value.into(), timestamp)
    }

    /// Logs a value stamped with timestamp zero.
    pub fn log_static(&mut self, name: &str, value: impl Into<Payload>) -> Result<(), TelemetryError> {
        self.record(name, value.into(), 0)
    }

    fn record(&mut self, name: &str, payload: Payload, timestamp: Timestamp) -> Result<(), TelemetryError> {
        let series_id = match self.registry.validate(name, &payload) {
            Ok(descriptor) => descriptor.id,
            Err(e) => {
                logger_metrics::record_value_rejected();
                self.emit(LoggerEvent::ValueRejected {
                    series: name.to_string(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let value = LoggedValue {
            series: name.to_string(),
            series_id,
            timestamp,
            payload,
        };

        if self.has_active_sink() {
            logger_metrics::record_value_logged(false);
            self.write_to_active(|mode, buf| encode_value(&value, mode, buf));
        } else {
            logger_metrics::record_value_logged(true);
            self.buffer.stage(value);
        }
        Ok(())
    }

    /// Starts persisting to `path`, truncating it.
    ///
    /// An already attached file sink is detached first. On success the file
    /// receives every current declaration, then the buffered values.
    ///
    /// # Errors
    /// `SinkOpenFailed` if the file cannot be created; the logger then has no
    /// file sink and the buffer is untouched.
    pub fn attach_file<P: AsRef<Path>>(&mut self, path: P, mode: OutputMode) -> Result<(), TelemetryError> {
        if self.file.is_some() {
            self.detach_file();
        }
        let path = path.as_ref().to_path_buf();
        let sink = match FileSink::create(&path) {
            Ok(sink) => sink,
            Err(e) => {
                self.emit(LoggerEvent::SinkAttachFailed {
                    slot: SinkSlot::File,
                    path: Some(path),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };
        self.bind(SinkSlot::File, Box::new(sink), mode, Some(path))
    }

    /// Stops persisting to file and releases the handle. No-op when detached.
    pub fn detach_file(&mut self) {
        self.detach_slot(SinkSlot::File);
    }

    /// Starts mirroring records to stdout.
    pub fn attach_console(&mut self, mode: OutputMode) -> Result<(), TelemetryError> {
        self.attach_sink(SinkSlot::Console, Box::new(ConsoleSink::stdout()), mode)
    }

    /// Starts mirroring records to `out` in place of stdout.
    pub fn attach_console_to(
        &mut self,
        out: Box<dyn Write + Send>,
        mode: OutputMode,
    ) -> Result<(), TelemetryError> {
        self.attach_sink(SinkSlot::Console, Box::new(ConsoleSink::to_writer(out)), mode)
    }

    /// Stops mirroring to the console. No-op when detached.
    pub fn detach_console(&mut self) {
        self.detach_slot(SinkSlot::Console);
    }

    /// Binds `sink` to `slot`, replacing whatever was there, then replays the
    /// declarations and drains the buffer into it.
    ///
    /// Values only reach the buffer while no sink is attached, so the buffer is
    /// drained by the first attachment and seen empty by any later one.
    ///
    /// # Errors
    /// `SinkWriteFailed` if the replay could not be written. The new sink is
    /// closed and left unattached, and the buffered values stay buffered.
    pub fn attach_sink(
        &mut self,
        slot: SinkSlot,
        sink: Box<dyn ByteSink>,
        mode: OutputMode,
    ) -> Result<(), TelemetryError> {
        self.bind(slot, sink, mode, None)
    }

    fn bind(
        &mut self,
        slot: SinkSlot,
        sink: Box<dyn ByteSink>,
        mode: OutputMode,
        path: Option<PathBuf>,
    ) -> Result<(), TelemetryError> {
        if self.slot(slot).is_some() {
            self.close_slot(slot);
        }

        let mut replay = Vec::new();
        for descriptor in self.registry.replay_descriptors() {
            encode_declaration(descriptor, mode, &mut replay);
        }
        let pending = self.buffer.sorted();
        let drained = pending.len();
        for value in pending {
            encode_value(value, mode, &mut replay);
        }

        let mut binding = SinkBinding::new(slot, mode, sink);
        if !replay.is_empty() {
            if let Err(e) = binding.emit(&replay) {
                let _ = binding.close();
                self.emit(LoggerEvent::SinkWriteFailed {
                    slot,
                    error: e.to_string(),
                });
                return Err(e);
            }
            logger_metrics::record_bytes_written(slot.name(), replay.len());
        }

        self.buffer.clear();
        self.registry.release_retired();
        if slot == SinkSlot::File {
            self.file_path = path.clone();
        }
        *self.slot_mut(slot) = Some(binding);

        self.emit(LoggerEvent::SinkAttached { slot, mode, path });
        if drained > 0 {
            self.emit(LoggerEvent::BufferDrained {
                slot,
                values: drained,
            });
        }
        Ok(())
    }

    /// Forgets every series. Buffered values and sinks follow the configured [`ClearPolicy`].
    ///
    /// Identifiers restart at [`crate::FIRST_SERIES_ID`]. When buffered values
    /// are kept, the series they belong to keep their ids and are declared
    /// again to the sink that drains them, so new series are numbered above them.
    /// Output already written to sinks is not touched.
    pub fn clear(&mut self) {
        let policy = self.config.clear_policy;

        let discarded_values = if policy.discard_buffer {
            let n = self.buffer.len();
            self.buffer.clear();
            self.registry.clear();
            n
        } else {
            let pending = self.buffer.series_ids();
            self.registry.retire(|id| pending.contains(&id));
            0
        };
        if policy.detach_sinks {
            self.detach_console();
            self.detach_file();
        }
        self.emit(LoggerEvent::Cleared {
            discarded_values,
            detached_sinks: policy.detach_sinks,
        });
    }

    /// Names of the declared series, in declaration order.
    pub fn series_names(&self) -> Vec<String> {
        self.registry.list_names()
    }

    pub fn series(&self, name: &str) -> Option<&SeriesDescriptor> {
        self.registry.lookup(name)
    }

    /// Number of values waiting for a sink.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_console_active(&self) -> bool {
        self.console.is_some()
    }

    pub fn is_file_active(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the attached file sink, if any.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn record_name(&self) -> &str {
        &self.config.record_name
    }

    /// Time elapsed since the logger was created.
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    fn now(&self) -> Timestamp {
        duration_to_nanos(self.clock.elapsed())
    }

    fn has_active_sink(&self) -> bool {
        self.console.is_some() || self.file.is_some()
    }

    fn slot(&self, slot: SinkSlot) -> &Option<SinkBinding> {
        match slot {
            SinkSlot::Console => &self.console,
            SinkSlot::File => &self.file,
        }
    }

    fn slot_mut(&mut self, slot: SinkSlot) -> &mut Option<SinkBinding> {
        match slot {
            SinkSlot::Console => &mut self.console,
            SinkSlot::File => &mut self.file,
        }
    }

    /// Encodes a record in each attached sink's mode and writes it there.
    fn write_to_active<F>(&mut self, encode: F)
    where
        F: Fn(OutputMode, &mut Vec<u8>),
    {
        let mut failures = Vec::new();
        for binding in [&mut self.console, &mut self.file].into_iter().flatten() {
            let mut buf = Vec::new();
            encode(binding.mode(), &mut buf);
            match binding.emit(&buf) {
                Ok(()) => logger_metrics::record_bytes_written(binding.slot().name(), buf.len()),
                Err(e) => failures.push((binding.slot(), e)),
            }
        }
        for (slot, e) in failures {
            self.emit(LoggerEvent::SinkWriteFailed {
                slot,
                error: e.to_string(),
            });
        }
    }

    fn detach_slot(&mut self, slot: SinkSlot) {
        if self.slot(slot).is_some() {
            self.close_slot(slot);
            self.emit(LoggerEvent::SinkDetached { slot });
        }
    }

    fn close_slot(&mut self, slot: SinkSlot) {
        if slot == SinkSlot::File {
            self.file_path = None;
        }
        if let Some(mut binding) = self.slot_mut(slot).take() {
            if let Err(e) = binding.close() {
                self.emit(LoggerEvent::SinkWriteFailed {
                    slot,
                    error: e.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: LoggerEvent) {
        let _span = tracing::info_span!("telemetry", record = %self.config.record_name).entered();
        self.config.event_listener.on_event(event);
    }
}

impl Drop for TelemetryLogger {
    fn drop(&mut self) {
        self.close_slot(SinkSlot::Console);
        self.close_slot(SinkSlot::File);
    }
}
