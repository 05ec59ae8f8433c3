//! Decoder for the binary record stream written by sinks in [`OutputMode::Binary`].
//!
//! Declaration records do not carry the series kind, so the reader must be told
//! the kind of each series (by name) before it can decode that series' values.
//!
//! [`OutputMode::Binary`]: crate::encoding::OutputMode::Binary

use crate::encoding::{DECLARATION_MARKER, UNIT_FIELD_LEN};
use crate::error::TelemetryError;
use crate::types::{LoggedValue, Payload, SeriesId, Timestamp, ValueKind};

use std::collections::HashMap;

/// Series metadata as found in a binary declaration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationRecord {
    pub id: SeriesId,
    pub name: String,
    /// Unit with its zero padding removed.
    pub unit: String,
    pub registered_at: Timestamp,
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Declaration(DeclarationRecord),
    Value(LoggedValue),
}

/// Iterates over the records of a binary stream.
///
/// Yields `Err` once on malformed or truncated input and stops.
#[derive(Debug)]
pub struct RecordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    kinds: HashMap<String, ValueKind>,
    declared: HashMap<SeriesId, (String, Option<ValueKind>)>,
    failed: bool,
}

impl<'a> RecordReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            kinds: HashMap::new(),
            declared: HashMap::new(),
            failed: false,
        }
    }

    /// Tells the reader how to decode values of series `name`.
    pub fn with_kind(mut self, name: &str, kind: ValueKind) -> Self {
        self.kinds.insert(name.to_string(), kind);
        self
    }

    /// Decodes the remaining records, failing on the first malformed one.
    pub fn read_all(self) -> Result<Vec<Record>, TelemetryError> {
        self.collect()
    }

    /// Byte offset of the next record.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn next_record(&mut self) -> Result<Record, TelemetryError> {
        let start = self.pos;
        let head = self.read_u16()?;
        if head == DECLARATION_MARKER {
            return self.read_declaration().map(Record::Declaration);
        }

        let (series, kind) = match self.declared.get(&head) {
            Some((name, Some(kind))) => (name.clone(), *kind),
            Some((name, None)) => {
                return Err(self.error_at(
                    start,
                    format!("no value kind known for series '{}' (id {})", name, head),
                ))
            }
            None => {
                return Err(self.error_at(start, format!("value for undeclared series id {}", head)))
            }
        };

        let timestamp = self.read_u64()?;
        let payload = match kind {
            ValueKind::Numeric => Payload::Numeric(f64::from_bits(self.read_u64()?)),
            ValueKind::Text => {
                let len = self.read_u32()? as usize;
                let at = self.pos;
                let bytes = self.take(len)?;
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|e| self.error_at(at, format!("text value is not UTF-8: {}", e)))?;
                Payload::Text(text)
            }
        };

        Ok(Record::Value(LoggedValue {
            series,
            series_id: head,
            timestamp,
            payload,
        }))
    }

    fn read_declaration(&mut self) -> Result<DeclarationRecord, TelemetryError> {
        let name_len = usize::from(self.read_u16()?);
        let at = self.pos;
        let name_bytes = self.take(name_len)?;
        let name = String::from_utf8(name_bytes.to_vec())
            .map_err(|e| self.error_at(at, format!("series name is not UTF-8: {}", e)))?;
        let id = self.read_u16()?;
        let registered_at = self.read_u64()?;
        let unit_field = self.take(UNIT_FIELD_LEN)?;
        let unit_len = unit_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(UNIT_FIELD_LEN);
        // Truncation may split a multi-byte character.
        let unit = String::from_utf8_lossy(&unit_field[..unit_len]).into_owned();

        let kind = self.kinds.get(&name).copied();
        self.declared.insert(id, (name.clone(), kind));
        Ok(DeclarationRecord {
            id,
            name,
            unit,
            registered_at,
        })
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], TelemetryError> {
        let bytes: &'a [u8] = self.bytes;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                self.error_at(
                    self.pos,
                    format!("truncated record: wanted {} bytes, {} left", len, bytes.len() - self.pos),
                )
            })?;
        let out = &bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_u16(&mut self) -> Result<u16, TelemetryError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, TelemetryError> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(b))
    }

    fn read_u64(&mut self) -> Result<u64, TelemetryError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(b))
    }

    fn error_at(&self, offset: usize, details: String) -> TelemetryError {
        TelemetryError::Decode { offset, details }
    }
}

impl Iterator for RecordReader<'_> {
    type Item = Result<Record, TelemetryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.bytes.len() {
            return None;
        }
        let record = self.next_record();
        if record.is_err() {
            self.failed = true;
        }
        Some(record)
    }
}
