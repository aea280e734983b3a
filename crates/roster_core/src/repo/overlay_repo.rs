//! Overlay persistence for user-authored records.
//!
//! # Responsibility
//! - Read and write one partition's overlay blob (JSON array of records).
//! - Keep pure seed passthroughs out of durable storage.
//! - Persist the opt-in tombstone set that hides seed records.
//!
//! # Invariants
//! - Reads never fail: missing or corrupt blobs degrade to an empty overlay,
//!   and `load_outcome` reports which case happened.
//! - Written blobs always carry ISO-8601 `createdAt` values.
//! - An id or `createdAt` generated while reading is written back at once,
//!   so repeated reads of the same blob return the same records.
//! - Write failures are logged and swallowed by `save`; `try_save` exposes
//!   them.

use crate::model::record::{json_kind, Record, RecordId, CREATED_AT_FIELD};
use crate::model::schema::EntitySchema;
use crate::repo::kv_store::{KeyValueStore, StoreError, StoreResult};
use crate::seed::SeedRegistry;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

const HIDDEN_KEYS_SUFFIX: &str = "::hidden";

/// Objects whose id or `createdAt` would be generated anew on every read.
fn needs_repair(object: &Map<String, Value>) -> bool {
    Record::stored_id(object).is_none() || !object.contains_key(CREATED_AT_FIELD)
}

/// Typed outcome of reading an overlay blob.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayLoad {
    /// Blob existed and parsed; may still be an empty list.
    Loaded(Vec<Record>),
    /// Nothing has been stored for this partition yet.
    Empty,
    /// Storage failed or held something other than a JSON array.
    Unreadable { reason: String },
}

impl OverlayLoad {
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::Loaded(records) => records,
            Self::Empty | Self::Unreadable { .. } => Vec::new(),
        }
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Unreadable { .. })
    }
}

/// Overlay repository bound to one partition.
pub struct OverlayRepository<'a, S: KeyValueStore> {
    store: S,
    schema: &'a EntitySchema,
    seeds: &'a SeedRegistry,
}

impl<'a, S: KeyValueStore> OverlayRepository<'a, S> {
    pub fn new(store: S, schema: &'a EntitySchema, seeds: &'a SeedRegistry) -> Self {
        Self {
            store,
            schema,
            seeds,
        }
    }

    pub fn schema(&self) -> &'a EntitySchema {
        self.schema
    }

    pub fn seeds(&self) -> &'a SeedRegistry {
        self.seeds
    }

    /// Reads all durable overlay records; degrades to empty on any failure.
    pub fn load(&self) -> Vec<Record> {
        self.load_outcome().into_records()
    }

    /// Reads all durable overlay records and reports how the read went.
    ///
    /// Non-object array elements are skipped; the remaining records survive.
    pub fn load_outcome(&self) -> OverlayLoad {
        let partition = self.schema.partition;
        let raw = match self.store.get(partition) {
            Ok(Some(raw)) => raw,
            Ok(None) => return OverlayLoad::Empty,
            Err(err) => {
                warn!(
                    "event=overlay_load module=repo status=degraded partition={partition} error_code=store_read_failed error={err}"
                );
                return OverlayLoad::Unreadable {
                    reason: err.to_string(),
                };
            }
        };

        let items = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                warn!(
                    "event=overlay_load module=repo status=degraded partition={partition} error_code=not_an_array kind={}",
                    json_kind(&other)
                );
                return OverlayLoad::Unreadable {
                    reason: format!("expected JSON array, got {}", json_kind(&other)),
                };
            }
            Err(err) => {
                warn!(
                    "event=overlay_load module=repo status=degraded partition={partition} error_code=malformed_json error={err}"
                );
                return OverlayLoad::Unreadable {
                    reason: err.to_string(),
                };
            }
        };

        let total = items.len();
        let mut repaired = 0usize;
        let records = items
            .iter()
            .filter_map(|item| match item {
                Value::Object(object) => {
                    if needs_repair(object) {
                        repaired += 1;
                    }
                    Some(Record::from_object(object))
                }
                _ => None,
            })
            .collect::<Vec<_>>();
        if records.len() != total {
            warn!(
                "event=overlay_load module=repo status=degraded partition={partition} error_code=non_object_items skipped={}",
                total - records.len()
            );
        }
        if repaired > 0 {
            self.write_repaired(&records, repaired);
        }
        debug!(
            "event=overlay_load module=repo status=ok partition={partition} count={}",
            records.len()
        );
        OverlayLoad::Loaded(records)
    }

    /// Persists the overlay subset of a complete merged set.
    ///
    /// A record is left out exactly when it is an unmodified copy of the seed
    /// record sharing its business key. Failures are logged, not returned.
    pub fn save(&self, all: &[Record]) {
        if let Err(err) = self.try_save(all) {
            warn!(
                "event=overlay_save module=repo status=error partition={} error={err}",
                self.schema.partition
            );
        }
    }

    /// Same as `save`, but surfaces storage/encoding failures.
    pub fn try_save(&self, all: &[Record]) -> StoreResult<()> {
        let overlay = all
            .iter()
            .filter(|record| !self.is_seed_passthrough(record))
            .collect::<Vec<_>>();
        let blob = serde_json::to_string(&overlay)?;
        self.store.set(self.schema.partition, &blob)?;
        debug!(
            "event=overlay_save module=repo status=ok partition={} count={} dropped_seed_copies={}",
            self.schema.partition,
            overlay.len(),
            all.len() - overlay.len()
        );
        Ok(())
    }

    /// Pins values generated at read time so later reads return the same ids.
    fn write_repaired(&self, records: &[Record], repaired: usize) {
        let partition = self.schema.partition;
        let result = serde_json::to_string(records)
            .map_err(StoreError::from)
            .and_then(|blob| self.store.set(partition, &blob));
        match result {
            Ok(()) => info!(
                "event=overlay_repair module=repo status=ok partition={partition} repaired={repaired}"
            ),
            Err(err) => warn!(
                "event=overlay_repair module=repo status=error partition={partition} repaired={repaired} error={err}"
            ),
        }
    }

    /// Deletes one record by id from durable storage.
    ///
    /// Unknown ids and unreadable blobs are left untouched.
    pub fn remove(&self, id: &RecordId) {
        let records = match self.load_outcome() {
            OverlayLoad::Loaded(records) => records,
            OverlayLoad::Empty | OverlayLoad::Unreadable { .. } => return,
        };
        let before = records.len();
        let kept = records
            .into_iter()
            .filter(|record| &record.id != id)
            .collect::<Vec<_>>();
        if kept.len() == before {
            return;
        }
        self.save(&kept);
    }

    /// Reads the tombstone set of hidden seed business keys.
    pub fn hidden_keys(&self) -> BTreeSet<String> {
        let key = self.hidden_keys_key();
        match self.store.get(&key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(
                    "event=tombstone_load module=repo status=degraded partition={} error_code=malformed_json error={err}",
                    self.schema.partition
                );
                BTreeSet::new()
            }),
            Ok(None) => BTreeSet::new(),
            Err(err) => {
                warn!(
                    "event=tombstone_load module=repo status=degraded partition={} error_code=store_read_failed error={err}",
                    self.schema.partition
                );
                BTreeSet::new()
            }
        }
    }

    /// Replaces the tombstone set; an empty set removes the blob.
    pub fn set_hidden_keys(&self, keys: &BTreeSet<String>) {
        let key = self.hidden_keys_key();
        let result = if keys.is_empty() {
            self.store.remove(&key)
        } else {
            serde_json::to_string(keys)
                .map_err(StoreError::from)
                .and_then(|blob| self.store.set(&key, &blob))
        };
        if let Err(err) = result {
            warn!(
                "event=tombstone_save module=repo status=error partition={} error={err}",
                self.schema.partition
            );
        }
    }

    fn hidden_keys_key(&self) -> String {
        format!("{}{HIDDEN_KEYS_SUFFIX}", self.schema.partition)
    }

    fn is_seed_passthrough(&self, record: &Record) -> bool {
        self.schema
            .business_key_of(record)
            .and_then(|key| self.seeds.find_by_key(self.schema, &key))
            .is_some_and(|seed| seed == record)
    }
}

#[cfg(test)]
mod tests {
    use super::{OverlayLoad, OverlayRepository};
    use crate::model::record::Record;
    use crate::model::schema::ORGANIZERS;
    use crate::repo::kv_store::{KeyValueStore, MemoryKvStore};
    use crate::seed::SeedRegistry;
    use std::collections::BTreeSet;

    #[test]
    fn missing_blob_is_empty_not_unreadable() {
        let store = MemoryKvStore::new();
        let seeds = SeedRegistry::empty();
        let repo = OverlayRepository::new(&store, &ORGANIZERS, &seeds);
        assert_eq!(repo.load_outcome(), OverlayLoad::Empty);
    }

    #[test]
    fn non_array_blob_is_unreadable() {
        let store = MemoryKvStore::new();
        store.set("organizers", "{\"id\":\"x\"}").unwrap();
        let seeds = SeedRegistry::empty();
        let repo = OverlayRepository::new(&store, &ORGANIZERS, &seeds);
        assert!(repo.load_outcome().is_unreadable());
        assert!(repo.load().is_empty());
    }

    #[test]
    fn non_object_items_are_skipped() {
        let store = MemoryKvStore::new();
        store
            .set(
                "organizers",
                r#"[1, {"id":"a","organizerNumber":"ORG-9"}, "x"]"#,
            )
            .unwrap();
        let seeds = SeedRegistry::empty();
        let repo = OverlayRepository::new(&store, &ORGANIZERS, &seeds);
        let records = repo.load();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_str(), "a");
    }

    #[test]
    fn tombstones_roundtrip_and_clear() {
        let store = MemoryKvStore::new();
        let seeds = SeedRegistry::empty();
        let repo = OverlayRepository::new(&store, &ORGANIZERS, &seeds);

        let keys = BTreeSet::from(["ORG-1".to_string()]);
        repo.set_hidden_keys(&keys);
        assert_eq!(repo.hidden_keys(), keys);
        assert!(store.get("organizers::hidden").unwrap().is_some());

        repo.set_hidden_keys(&BTreeSet::new());
        assert!(repo.hidden_keys().is_empty());
        assert!(store.get("organizers::hidden").unwrap().is_none());
    }

    #[test]
    fn remove_ignores_unknown_id() {
        let store = MemoryKvStore::new();
        let seeds = SeedRegistry::empty();
        let repo = OverlayRepository::new(&store, &ORGANIZERS, &seeds);
        let record = Record::new().field("organizerNumber", "ORG-5");
        repo.save(std::slice::from_ref(&record));

        repo.remove(&"missing".into());
        assert_eq!(repo.load(), vec![record]);
    }
}
