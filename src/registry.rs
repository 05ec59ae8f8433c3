//! Series registry: name uniqueness, id assignment and payload kind validation.

use crate::error::TelemetryError;
use crate::types::{Payload, SeriesDescriptor, SeriesId, Timestamp, ValueKind, FIRST_SERIES_ID};
use std::collections::HashMap;

/// Owns the mapping from series name to its descriptor.
///
/// Retired descriptors belong to series dropped by [`SeriesRegistry::retire`]
/// whose values are still buffered. They cannot be logged against, but they
/// keep their ids reserved and are replayed so those values stay decodable.
#[derive(Debug)]
pub struct SeriesRegistry {
    series: HashMap<String, SeriesDescriptor>,
    retired: Vec<SeriesDescriptor>,
    next_id: Option<SeriesId>,
}

impl Default for SeriesRegistry {
    fn default() -> Self {
        Self {
            series: HashMap::new(),
            retired: Vec::new(),
            next_id: Some(FIRST_SERIES_ID),
        }
    }
}

impl SeriesRegistry {
    /// Registers a new series and returns a copy of its descriptor.
    ///
    /// Fails without mutation if the name is taken, empty, too long for the
    /// u16 length field of a declaration record, or if no id is left.
    pub fn declare(
        &mut self,
        name: &str,
        unit: &str,
        kind: ValueKind,
        registered_at: Timestamp,
    ) -> Result<SeriesDescriptor, TelemetryError> {
        if self.series.contains_key(name) {
            return Err(TelemetryError::AlreadyDeclared(name.to_string()));
        }
        if name.is_empty() {
            return Err(TelemetryError::InvalidSeriesName(
                "series name must not be empty".to_string(),
            ));
        }
        if name.len() > usize::from(u16::MAX) {
            return Err(TelemetryError::InvalidSeriesName(format!(
                "series name is {} bytes, at most {} allowed",
                name.len(),
                u16::MAX
            )));
        }
        let id = self
            .next_id
            .ok_or_else(|| TelemetryError::SeriesLimitReached(name.to_string()))?;

        let descriptor = SeriesDescriptor {
            id,
            name: name.to_string(),
            unit: unit.to_string(),
            kind,
            registered_at,
        };
        self.series.insert(name.to_string(), descriptor.clone());
        self.next_id = id.checked_add(1);
        Ok(descriptor)
    }

    pub fn lookup(&self, name: &str) -> Option<&SeriesDescriptor> {
        self.series.get(name)
    }

    /// Checks that `name` is declared and accepts `payload`.
    pub fn validate(&self, name: &str, payload: &Payload) -> Result<&SeriesDescriptor, TelemetryError> {
        let descriptor = self
            .series
            .get(name)
            .ok_or_else(|| TelemetryError::NotDeclared(name.to_string()))?;

        let found = payload.kind();
        if descriptor.kind != found {
            return Err(TelemetryError::TypeMismatch {
                series: name.to_string(),
                expected: descriptor.kind,
                found,
            });
        }
        if let Payload::Text(text) = payload {
            if u32::try_from(text.len()).is_err() {
                return Err(TelemetryError::PayloadTooLarge {
                    series: name.to_string(),
                    len: text.len(),
                });
            }
        }
        Ok(descriptor)
    }

    /// Descriptors in declaration (id) order.
    pub fn descriptors(&self) -> Vec<&SeriesDescriptor> {
        let mut all: Vec<&SeriesDescriptor> = self.series.values().collect();
        all.sort_by_key(|d| d.id);
        all
    }

    /// Retired then live descriptors, in id order. This is what a newly
    /// attached sink needs to decode everything it is about to receive.
    pub fn replay_descriptors(&self) -> Vec<&SeriesDescriptor> {
        let mut all: Vec<&SeriesDescriptor> =
            self.retired.iter().chain(self.series.values()).collect();
        all.sort_by_key(|d| d.id);
        all
    }

    /// Declared names in declaration order.
    pub fn list_names(&self) -> Vec<String> {
        self.descriptors()
            .into_iter()
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Drops every descriptor and restarts ids at [`FIRST_SERIES_ID`].
    pub fn clear(&mut self) {
        self.series.clear();
        self.retired.clear();
        self.next_id = Some(FIRST_SERIES_ID);
    }

    /// Drops every live descriptor, keeping as retired those whose id
    /// satisfies `in_use`. Ids restart just above the highest retired id, or
    /// at [`FIRST_SERIES_ID`] when nothing is retired.
    pub fn retire<F>(&mut self, in_use: F)
    where
        F: Fn(SeriesId) -> bool,
    {
        let mut retired = std::mem::take(&mut self.retired);
        retired.extend(self.series.drain().map(|(_, d)| d));
        retired.retain(|d| in_use(d.id));
        retired.sort_by_key(|d| d.id);
        self.next_id = match retired.last() {
            Some(d) => d.id.checked_add(1),
            None => Some(FIRST_SERIES_ID),
        };
        self.retired = retired;
    }

    /// Forgets retired descriptors once their values have been written.
    pub fn release_retired(&mut self) {
        self.retired.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_assigns_dense_ids() {
        let mut registry = SeriesRegistry::default();
        let a = registry.declare("a", "V", ValueKind::Numeric, 10).unwrap();
        let b = registry.declare("b", "", ValueKind::Text, 20).unwrap();
        let c = registry.declare("c", "A", ValueKind::Numeric, 30).unwrap();

        assert_eq!(a.id, FIRST_SERIES_ID);
        assert_eq!(b.id, FIRST_SERIES_ID + 1);
        assert_eq!(c.id, FIRST_SERIES_ID + 2);
        assert_eq!(b.registered_at, 20);
        assert_eq!(registry.list_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_declaration_leaves_registry_unchanged() {
        let mut registry = SeriesRegistry::default();
        registry.declare("battery", "V", ValueKind::Numeric, 5).unwrap();

        let err = registry
            .declare("battery", "mV", ValueKind::Text, 99)
            .unwrap_err();
        assert!(matches!(err, TelemetryError::AlreadyDeclared(ref n) if n == "battery"));

        let d = registry.lookup("battery").unwrap();
        assert_eq!(d.unit, "V");
        assert_eq!(d.kind, ValueKind::Numeric);
        assert_eq!(d.registered_at, 5);
        assert_eq!(registry.len(), 1);

        // The rejected call must not consume an id.
        let next = registry.declare("other", "", ValueKind::Text, 6).unwrap();
        assert_eq!(next.id, FIRST_SERIES_ID + 1);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut registry = SeriesRegistry::default();
        assert!(matches!(
            registry.declare("", "V", ValueKind::Numeric, 0),
            Err(TelemetryError::InvalidSeriesName(_))
        ));
        let long = "x".repeat(usize::from(u16::MAX) + 1);
        assert!(matches!(
            registry.declare(&long, "V", ValueKind::Numeric, 0),
            Err(TelemetryError::InvalidSeriesName(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_validate_kinds() {
        let mut registry = SeriesRegistry::default();
        registry.declare("temp", "C", ValueKind::Numeric, 0).unwrap();
        registry.declare("status", "", ValueKind::Text, 0).unwrap();

        assert!(registry.validate("temp", &Payload::Numeric(21.5)).is_ok());
        assert!(registry.validate("status", &Payload::from("OK")).is_ok());

        match registry.validate("status", &Payload::Numeric(42.0)) {
            Err(TelemetryError::TypeMismatch { series, expected, found }) => {
                assert_eq!(series, "status");
                assert_eq!(expected, ValueKind::Text);
                assert_eq!(found, ValueKind::Numeric);
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
        assert!(matches!(
            registry.validate("missing", &Payload::Numeric(1.0)),
            Err(TelemetryError::NotDeclared(_))
        ));
    }

    #[test]
    fn test_clear_resets_ids() {
        let mut registry = SeriesRegistry::default();
        registry.declare("a", "", ValueKind::Numeric, 0).unwrap();
        registry.declare("b", "", ValueKind::Numeric, 0).unwrap();
        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.lookup("a").is_none());
        let b = registry.declare("b", "", ValueKind::Numeric, 0).unwrap();
        assert_eq!(b.id, FIRST_SERIES_ID);
    }

    #[test]
    fn test_retire_reserves_ids_of_pending_series() {
        let mut registry = SeriesRegistry::default();
        registry.declare("a", "V", ValueKind::Numeric, 0).unwrap();
        registry.declare("b", "", ValueKind::Text, 0).unwrap();
        registry.declare("c", "", ValueKind::Numeric, 0).unwrap();
        registry.retire(|id| id == 2);

        assert!(registry.is_empty());
        assert_eq!(registry.replay_descriptors().len(), 1);
        assert!(registry.validate("b", &Payload::from("x")).is_err());

        let d = registry.declare("d", "", ValueKind::Numeric, 0).unwrap();
        assert_eq!(d.id, 3, "ids continue above the retired series");

        let replay: Vec<(SeriesId, &str)> = registry
            .replay_descriptors()
            .into_iter()
            .map(|d| (d.id, d.name.as_str()))
            .collect();
        assert_eq!(replay, vec![(2, "b"), (3, "d")]);

        registry.release_retired();
        assert_eq!(registry.replay_descriptors().len(), 1);
    }

    #[test]
    fn test_retire_nothing_pending_restarts_ids() {
        let mut registry = SeriesRegistry::default();
        registry.declare("a", "", ValueKind::Numeric, 0).unwrap();
        registry.retire(|_| false);
        assert!(registry.replay_descriptors().is_empty());
        let a = registry.declare("a", "", ValueKind::Numeric, 0).unwrap();
        assert_eq!(a.id, FIRST_SERIES_ID);
    }

    #[test]
    fn test_id_space_exhaustion() {
        let mut registry = SeriesRegistry::default();
        for i in 0..usize::from(u16::MAX) {
            registry
                .declare(&format!("s{}", i), "", ValueKind::Numeric, 0)
                .unwrap();
        }
        assert_eq!(registry.lookup("s65534").map(|d| d.id), Some(u16::MAX));
        assert!(matches!(
            registry.declare("one_too_many", "", ValueKind::Numeric, 0),
            Err(TelemetryError::SeriesLimitReached(_))
        ));
        assert!(registry.lookup("one_too_many").is_none());
    }
}
