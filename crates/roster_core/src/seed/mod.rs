//! Bundled, read-only reference dataset.
//!
//! # Responsibility
//! - Expose the build-time seed records of each partition in fixed order.
//! - Answer business-key membership questions for overlay persistence.
//!
//! # Invariants
//! - Seed records are never mutated or removed at runtime.
//! - `list` always succeeds and performs no I/O.

use crate::model::record::Record;
use crate::model::schema::{EntitySchema, EMPLOYEES, ORGANIZERS, PASSPORT_CONTAINERS};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

const BUNDLED: &[(&str, &str)] = &[
    (ORGANIZERS.partition, include_str!("data/organizers.json")),
    (EMPLOYEES.partition, include_str!("data/employees.json")),
    (
        PASSPORT_CONTAINERS.partition,
        include_str!("data/passport_containers.json"),
    ),
];

static BUILTIN: Lazy<SeedRegistry> = Lazy::new(|| {
    SeedRegistry::from_records(BUNDLED.iter().map(|(partition, raw)| {
        let records: Vec<Record> =
            serde_json::from_str(raw).expect("bundled seed data is valid JSON");
        (partition.to_string(), records)
    }))
});

/// In-memory catalog of seed records keyed by partition.
#[derive(Debug, Clone, Default)]
pub struct SeedRegistry {
    partitions: BTreeMap<String, Vec<Record>>,
}

impl SeedRegistry {
    /// Returns the registry compiled into this binary.
    pub fn builtin() -> &'static SeedRegistry {
        &BUILTIN
    }

    /// Builds a registry from explicit partition contents.
    pub fn from_records(partitions: impl IntoIterator<Item = (String, Vec<Record>)>) -> Self {
        Self {
            partitions: partitions.into_iter().collect(),
        }
    }

    /// Registry without any seed data.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Seed records of `schema`'s partition in bundled order.
    pub fn list(&self, schema: &EntitySchema) -> &[Record] {
        self.partitions
            .get(schema.partition)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Finds the seed record carrying business key `key`.
    pub fn find_by_key(&self, schema: &EntitySchema, key: &str) -> Option<&Record> {
        self.list(schema)
            .iter()
            .find(|record| schema.business_key_of(record).as_deref() == Some(key))
    }

    pub fn contains_key(&self, schema: &EntitySchema, key: &str) -> bool {
        self.find_by_key(schema, key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::SeedRegistry;
    use crate::model::schema::{EMPLOYEES, HR_EMPLOYEES, ORGANIZERS, PASSPORT_CONTAINERS};
    use crate::model::timestamp::is_iso_text;

    #[test]
    fn builtin_partitions_parse_in_bundled_order() {
        let seeds = SeedRegistry::builtin();
        let numbers = seeds
            .list(&ORGANIZERS)
            .iter()
            .filter_map(|record| ORGANIZERS.business_key_of(record))
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec!["ORG-1001", "ORG-1002", "ORG-1003"]);
        assert_eq!(seeds.list(&EMPLOYEES).len(), 3);
        assert_eq!(seeds.list(&PASSPORT_CONTAINERS).len(), 2);
    }

    #[test]
    fn bundled_timestamps_are_normalized() {
        let seeds = SeedRegistry::builtin();
        for schema in [&ORGANIZERS, &EMPLOYEES, &PASSPORT_CONTAINERS] {
            for record in seeds.list(schema) {
                assert!(is_iso_text(&record.created_at), "{}", record.created_at);
            }
        }
        let legacy = seeds.find_by_key(&EMPLOYEES, "EMP-003").unwrap();
        assert_eq!(legacy.created_at, "2023-09-08T06:05:00.000Z");
    }

    #[test]
    fn partition_without_bundle_is_empty() {
        assert!(SeedRegistry::builtin().list(&HR_EMPLOYEES).is_empty());
        assert!(!SeedRegistry::empty().contains_key(&ORGANIZERS, "ORG-1001"));
    }
}
