//! Record encoding: readable lines and the fixed-layout little-endian binary form.
//!
//! Binary layout:
//! - declaration: `u16 0` · `u16 name_len` · name · `u16 id` · `u64 registered_at` · `[u8; 16]` unit
//! - value: `u16 id` · `u64 timestamp` · payload
//!   - numeric: `u64` IEEE-754 bits
//!   - text: `u32 len` · bytes
//!
//! There is no length prefix and no checksum; a reader needs the series kind
//! from elsewhere to decode a value payload.

use crate::types::{LoggedValue, Payload, SeriesDescriptor};

use serde::{Deserialize, Serialize};

/// How a sink renders records. Serde: lowercase string (`"readable"`, `"binary"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One human-readable line per event.
    Readable,
    /// Fixed-layout binary records.
    #[default]
    Binary,
}

/// First two bytes of every declaration record. Never a valid series id.
pub const DECLARATION_MARKER: u16 = 0;

/// Width of the unit field in a binary declaration record.
pub const UNIT_FIELD_LEN: usize = 16;

/// `Series '<name>' (ID: <id>, Unit: <unit>, Start time: <registered_at>)`
pub fn readable_declaration(series: &SeriesDescriptor) -> String {
    format!(
        "Series '{}' (ID: {}, Unit: {}, Start time: {})",
        series.name, series.id, series.unit, series.registered_at
    )
}

/// `<name> [<timestamp>]: <value>`
pub fn readable_value(value: &LoggedValue) -> String {
    let rendered = match &value.payload {
        Payload::Numeric(v) => format_numeric(*v),
        Payload::Text(s) => s.clone(),
    };
    format!("{} [{}]: {}", value.series, value.timestamp, rendered)
}

/// Six fractional digits, `nan`/`inf`/`-inf` for non-finite values.
pub fn format_numeric(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v == f64::INFINITY {
        "inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{:.6}", v)
    }
}

/// Appends a declaration record in `mode` to `buf`.
pub fn encode_declaration(series: &SeriesDescriptor, mode: OutputMode, buf: &mut Vec<u8>) {
    match mode {
        OutputMode::Readable => push_line(buf, &readable_declaration(series)),
        OutputMode::Binary => {
            let name = series.name.as_bytes();
            write_u16(buf, DECLARATION_MARKER);
            // The registry refuses names longer than u16::MAX bytes.
            write_u16(buf, name.len() as u16);
            buf.extend_from_slice(name);
            write_u16(buf, series.id);
            write_u64(buf, series.registered_at);
            write_fixed(buf, series.unit.as_bytes(), UNIT_FIELD_LEN);
        }
    }
}

/// Appends a value record in `mode` to `buf`.
pub fn encode_value(value: &LoggedValue, mode: OutputMode, buf: &mut Vec<u8>) {
    match mode {
        OutputMode::Readable => push_line(buf, &readable_value(value)),
        OutputMode::Binary => {
            write_u16(buf, value.series_id);
            write_u64(buf, value.timestamp);
            match &value.payload {
                Payload::Numeric(v) => write_u64(buf, v.to_bits()),
                Payload::Text(s) => {
                    // Payloads over u32::MAX bytes are rejected before they get here.
                    write_u32(buf, s.len() as u32);
                    buf.extend_from_slice(s.as_bytes());
                }
            }
        }
    }
}

fn push_line(buf: &mut Vec<u8>, line: &str) {
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
}

/// Writes `bytes` truncated or zero-padded to exactly `width` bytes.
fn write_fixed(buf: &mut Vec<u8>, bytes: &[u8], width: usize) {
    let kept = bytes.len().min(width);
    buf.extend_from_slice(&bytes[..kept]);
    buf.resize(buf.len() + (width - kept), 0);
}

pub fn write_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}
pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}
pub fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}
