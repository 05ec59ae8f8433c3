use crate::types::{LoggedValue, SeriesId};
use std::collections::HashSet;

/// Staging area for values logged while no sink is attached.
///
/// Unbounded: the owner is expected to attach a sink or clear it eventually.
#[derive(Debug, Default)]
pub struct ValueBuffer {
    values: Vec<LoggedValue>,
}

impl ValueBuffer {
    /// Appends a value to the buffer.
    pub fn stage(&mut self, value: LoggedValue) {
        self.values.push(value);
    }

    /// Staged values ordered by timestamp, leaving the buffer as is.
    ///
    /// The sort is stable, so values sharing a timestamp (e.g. static values
    /// stamped zero) keep the order they were logged in. The owner clears the
    /// buffer once the values have been written somewhere.
    pub fn sorted(&self) -> Vec<&LoggedValue> {
        let mut values: Vec<&LoggedValue> = self.values.iter().collect();
        values.sort_by_key(|v| v.timestamp);
        values
    }

    /// Ids of the series that still have values waiting.
    pub fn series_ids(&self) -> HashSet<SeriesId> {
        self.values.iter().map(|v| v.series_id).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Discards every staged value.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}
