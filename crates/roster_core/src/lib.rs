//! Local-first reference-entity store for the roster dashboard.
//!
//! Bundled seed records are overlaid with user-authored records kept in a
//! durable key-value store, reconciled into one merged view on every read,
//! and exchanged as CSV.

pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod media;
pub mod model;
pub mod repo;
pub mod seed;
pub mod service;

pub use config::{resolve_partition, ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use media::{attach_image, install_uploader, installed_uploader, ImageUploader, UploadError};
pub use model::record::{FieldValue, Record, RecordId};
pub use model::schema::{
    BusinessKey, EntitySchema, BUILTIN_SCHEMAS, EMPLOYEES, HR_EMPLOYEES, ORGANIZERS,
    PASSPORT_CONTAINERS,
};
pub use model::timestamp::{normalize, RawTimestamp};
pub use repo::kv_store::{KeyValueStore, MemoryKvStore, SqliteKvStore, StoreError, StoreResult};
pub use repo::overlay_repo::{OverlayLoad, OverlayRepository};
pub use seed::SeedRegistry;
pub use service::reconcile_service::{merge_views, ReconcileService};
pub use service::transfer_service::{
    decode_csv, export_csv, export_file_name, import_csv, DecodedImport, ImportReport,
};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
