//! Seed/overlay reconciliation use-cases.
//!
//! # Responsibility
//! - Build the merged view of one partition on every read.
//! - Route every mutation through overlay persistence only.
//!
//! # Invariants
//! - Merged order: seed records in bundled order, then overlay-only records
//!   in storage order.
//! - A business key shared by seed and overlay appears once, with the
//!   overlay's values, at the seed's position.
//! - Seed records are never mutated. Plain `delete` of a seed-backed record
//!   is not durable: the seed version comes back on the next read. Only
//!   `hide_seed` suppresses a seed record.

use crate::media::{attach_image, ImageUploader};
use crate::model::record::{Record, RecordId};
use crate::model::schema::EntitySchema;
use crate::repo::kv_store::KeyValueStore;
use crate::repo::overlay_repo::OverlayRepository;
use crate::seed::SeedRegistry;
use log::info;
use std::collections::{BTreeSet, HashMap};

/// Merges seed and overlay records of one partition.
///
/// Seed records whose business key is in `hidden` are suppressed. When two
/// overlay records share a key the later one wins and keeps the earlier
/// one's position.
pub fn merge_views(
    schema: &EntitySchema,
    seeds: &[Record],
    overlay: &[Record],
    hidden: &BTreeSet<String>,
) -> Vec<Record> {
    let mut merged: Vec<Record> = Vec::with_capacity(seeds.len() + overlay.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    let visible_seeds = seeds.iter().filter(|record| {
        schema
            .business_key_of(record)
            .map_or(true, |key| !hidden.contains(&key))
    });

    for record in visible_seeds.chain(overlay.iter()) {
        match schema.business_key_of(record) {
            Some(key) => match positions.get(&key) {
                Some(&index) => merged[index] = record.clone(),
                None => {
                    positions.insert(key, merged.len());
                    merged.push(record.clone());
                }
            },
            None => merged.push(record.clone()),
        }
    }

    merged
}

/// Reconciliation service bound to one partition.
pub struct ReconcileService<'a, S: KeyValueStore> {
    overlay: OverlayRepository<'a, S>,
}

impl<'a, S: KeyValueStore> ReconcileService<'a, S> {
    pub fn new(overlay: OverlayRepository<'a, S>) -> Self {
        Self { overlay }
    }

    /// Convenience constructor wiring a store, schema and seed registry.
    pub fn open(store: S, schema: &'a EntitySchema, seeds: &'a SeedRegistry) -> Self {
        Self::new(OverlayRepository::new(store, schema, seeds))
    }

    pub fn schema(&self) -> &'a EntitySchema {
        self.overlay.schema()
    }

    pub fn overlay(&self) -> &OverlayRepository<'a, S> {
        &self.overlay
    }

    /// Returns the merged view, recomputed from seed and durable overlay.
    pub fn get_all(&self) -> Vec<Record> {
        let schema = self.schema();
        merge_views(
            schema,
            self.overlay.seeds().list(schema),
            &self.overlay.load(),
            &self.overlay.hidden_keys(),
        )
    }

    /// Finds one record of the merged view by id.
    pub fn find(&self, id: &RecordId) -> Option<Record> {
        self.get_all().into_iter().find(|record| &record.id == id)
    }

    /// Inserts or replaces a record and persists the new merged set.
    ///
    /// Matching is by business key first, then by id (covers edits that
    /// change the key). A replacement keeps the existing id when the incoming
    /// one is empty; a fresh insert without id gets a generated one.
    pub fn upsert(&self, mut record: Record) -> Record {
        let schema = self.schema();
        let mut merged = self.get_all();

        let by_key = schema.business_key_of(&record).and_then(|key| {
            merged.iter().position(|existing| {
                schema.business_key_of(existing).as_deref() == Some(key.as_str())
            })
        });
        let target = by_key.or_else(|| {
            if record.id.is_empty() {
                None
            } else {
                merged.iter().position(|existing| existing.id == record.id)
            }
        });

        match target {
            Some(index) => {
                if record.id.is_empty() {
                    record.id = merged[index].id.clone();
                }
                merged[index] = record.clone();
                // A key change onto another record's key leaves the edited
                // record's previous entry behind under the same id.
                merged = merged
                    .into_iter()
                    .enumerate()
                    .filter(|(position, existing)| {
                        *position == index || existing.id != record.id
                    })
                    .map(|(_, existing)| existing)
                    .collect();
            }
            None => {
                if record.id.is_empty() {
                    record.id = RecordId::generate();
                }
                merged.push(record.clone());
            }
        }

        self.overlay.save(&merged);
        info!(
            "event=record_upsert module=service status=ok partition={} id={} replaced={}",
            schema.partition,
            record.id,
            target.is_some()
        );
        record
    }

    /// Attaches an uploaded image under `field`, then upserts the record.
    ///
    /// Without an uploader, or when the upload fails, the record is still
    /// written with `field` absent.
    pub fn upsert_with_image(
        &self,
        mut record: Record,
        uploader: Option<&dyn ImageUploader>,
        field: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Record {
        attach_image(uploader, &mut record, field, file_name, bytes);
        self.upsert(record)
    }

    /// Removes a record from the merged view and persists the result.
    ///
    /// Returns whether `id` was present. For seed-backed records this only
    /// drops the overlay override; the seed record is visible again on the
    /// next read.
    pub fn delete(&self, id: &RecordId) -> bool {
        let schema = self.schema();
        let mut merged = self.get_all();
        let Some(index) = merged.iter().position(|record| &record.id == id) else {
            return false;
        };

        let removed = merged.remove(index);
        self.overlay.save(&merged);

        let seed_backed = schema
            .business_key_of(&removed)
            .is_some_and(|key| self.overlay.seeds().contains_key(schema, &key));
        info!(
            "event=record_delete module=service status=ok partition={} id={id} seed_backed={seed_backed}",
            schema.partition
        );
        true
    }

    /// Persists an explicit merged set as-is (used by bulk import).
    pub fn persist(&self, merged: &[Record]) {
        self.overlay.save(merged);
    }

    /// Hides a seed record durably by recording a tombstone for its key.
    ///
    /// Overlay overrides of that key are dropped too. Returns `false` when no
    /// seed record carries `key`.
    pub fn hide_seed(&self, key: &str) -> bool {
        let schema = self.schema();
        let key = key.trim();
        if !self.overlay.seeds().contains_key(schema, key) {
            return false;
        }

        let mut hidden = self.overlay.hidden_keys();
        hidden.insert(key.to_string());
        self.overlay.set_hidden_keys(&hidden);

        let overlay = self.overlay.load();
        let kept = overlay
            .iter()
            .filter(|record| schema.business_key_of(record).as_deref() != Some(key))
            .cloned()
            .collect::<Vec<_>>();
        if kept.len() != overlay.len() {
            self.overlay.save(&kept);
        }

        info!(
            "event=seed_hide module=service status=ok partition={}",
            schema.partition
        );
        true
    }

    /// Removes a tombstone; returns whether one existed.
    pub fn unhide_seed(&self, key: &str) -> bool {
        let mut hidden = self.overlay.hidden_keys();
        if !hidden.remove(key.trim()) {
            return false;
        }
        self.overlay.set_hidden_keys(&hidden);
        true
    }
}
