//! Output sinks. Console and file are both [`ByteSink`]s so the logger writes
//! declaration replay, buffer drain and live records through one code path.

use crate::encoding::OutputMode;
use crate::error::TelemetryError;

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Destination for encoded records.
pub trait ByteSink: fmt::Debug + Send {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Flushes and releases the underlying handle. Later writes fail.
    fn close(&mut self) -> io::Result<()>;
}

/// Buffered file sink, opened in truncate mode.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Creates or truncates `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, TelemetryError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| TelemetryError::SinkOpenFailed {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        let path = &self.path;
        self.writer.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("file sink {} already closed", path.display()),
            )
        })
    }
}

impl ByteSink for FileSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer()?.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => {
                writer.flush()?;
                writer.get_ref().sync_data()
            }
            None => Ok(()),
        }
    }
}

/// Console sink. Writes to stdout unless constructed with another writer.
pub struct ConsoleSink {
    out: Box<dyn Write + Send>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self {
            out: Box::new(io::stdout()),
        }
    }

    pub fn to_writer(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }
}

impl fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleSink").finish_non_exhaustive()
    }
}

impl ByteSink for ConsoleSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// In-memory writer whose clones share one byte vector.
///
/// Handy as a console replacement: keep one clone, hand the other to
/// [`ConsoleSink::to_writer`], and inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        match self.bytes.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Contents decoded as UTF-8, lossily.
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .bytes
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Which of the two sink slots a binding occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkSlot {
    Console,
    File,
}

impl SinkSlot {
    pub fn name(self) -> &'static str {
        match self {
            SinkSlot::Console => "console",
            SinkSlot::File => "file",
        }
    }
}

impl fmt::Display for SinkSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An attached sink together with the mode it renders records in.
#[derive(Debug)]
pub struct SinkBinding {
    slot: SinkSlot,
    mode: OutputMode,
    sink: Box<dyn ByteSink>,
}

impl SinkBinding {
    pub fn new(slot: SinkSlot, mode: OutputMode, sink: Box<dyn ByteSink>) -> Self {
        Self { slot, mode, sink }
    }

    pub fn slot(&self) -> SinkSlot {
        self.slot
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Writes one batch of encoded records and flushes it through.
    pub fn emit(&mut self, bytes: &[u8]) -> Result<(), TelemetryError> {
        self.sink
            .write(bytes)
            .and_then(|()| self.sink.flush())
            .map_err(|source| TelemetryError::SinkWriteFailed {
                sink: self.slot.name(),
                source,
            })
    }

    pub fn close(&mut self) -> Result<(), TelemetryError> {
        self.sink
            .close()
            .map_err(|source| TelemetryError::SinkWriteFailed {
                sink: self.slot.name(),
                source,
            })
    }
}
