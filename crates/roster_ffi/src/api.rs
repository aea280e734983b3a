//! Page-facing use-case API for the dashboard UI.
//!
//! # Responsibility
//! - Expose list/upsert/delete and CSV export/import per partition.
//! - Keep error semantics simple: envelopes with `ok` and a message.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Records cross the boundary as JSON text in the durable record shape.

use chrono::Utc;
use log::warn;
use roster_core::db::open_db;
use roster_core::{
    core_version as core_version_inner, export_csv, export_file_name, import_csv,
    init_logging as init_logging_inner, installed_uploader, ping as ping_inner, resolve_partition,
    Record, RecordId, ReconcileService, SeedRegistry, SqliteKvStore, StoreConfig,
};
use std::path::PathBuf;
use std::sync::OnceLock;

static STORE_CONFIG: OnceLock<StoreConfig> = OnceLock::new();

/// Minimal health-check API.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Core crate version.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging once per process.
///
/// Returns an empty string on success and an error message otherwise.
/// Repeated calls with the same `level + log_dir` are idempotent.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.trim()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Merged view of one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionListResponse {
    pub ok: bool,
    /// JSON array of records in merged order (`[]` on failure).
    pub records_json: String,
    pub count: u32,
    pub message: String,
}

/// Result of a single-record mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordActionResponse {
    pub ok: bool,
    pub record_id: Option<String>,
    pub message: String,
}

impl RecordActionResponse {
    fn success(message: impl Into<String>, record_id: Option<String>) -> Self {
        Self {
            ok: true,
            record_id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            record_id: None,
            message: message.into(),
        }
    }
}

/// CSV export payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExportResponse {
    pub ok: bool,
    /// Suggested download name, `{partition}_{YYYY-MM-DD}.csv`.
    pub file_name: String,
    pub csv: String,
    pub message: String,
}

/// CSV import summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvImportResponse {
    pub ok: bool,
    pub imported: u32,
    /// 1-based line numbers of rows skipped for a column-count mismatch.
    pub skipped_rows: Vec<u32>,
    pub message: String,
}

/// Lists the merged view of `partition`.
#[flutter_rust_bridge::frb(sync)]
pub fn partition_list(partition: String) -> PartitionListResponse {
    let result = with_service(&partition, |service| {
        let records = service.get_all();
        let json = serde_json::to_string(&records).map_err(|err| err.to_string())?;
        Ok((json, records.len()))
    });
    match result {
        Ok((records_json, count)) => PartitionListResponse {
            ok: true,
            records_json,
            count: u32::try_from(count).unwrap_or(u32::MAX),
            message: format!("{count} record(s)."),
        },
        Err(err) => PartitionListResponse {
            ok: false,
            records_json: "[]".to_string(),
            count: 0,
            message: format!("partition_list failed: {err}"),
        },
    }
}

/// Creates or replaces one record given as a JSON object.
///
/// A missing `id` creates a new record unless the business key matches an
/// existing one.
#[flutter_rust_bridge::frb(sync)]
pub fn partition_upsert(partition: String, record_json: String) -> RecordActionResponse {
    let record = match decode_record(&record_json) {
        Ok(record) => record,
        Err(response) => return response,
    };

    match with_service(&partition, |service| Ok(service.upsert(record))) {
        Ok(stored) => RecordActionResponse::success("Record saved.", Some(stored.id.to_string())),
        Err(err) => RecordActionResponse::failure(format!("partition_upsert failed: {err}")),
    }
}

/// Creates or replaces one record and stores an uploaded image URL under
/// `image_field`.
///
/// Uses the uploader installed by the host. Without one, or when the upload
/// fails, the record is saved with `image_field` absent.
#[flutter_rust_bridge::frb(sync)]
pub fn partition_upsert_with_image(
    partition: String,
    record_json: String,
    image_field: String,
    file_name: String,
    image_bytes: Vec<u8>,
) -> RecordActionResponse {
    let record = match decode_record(&record_json) {
        Ok(record) => record,
        Err(response) => return response,
    };
    let field = image_field.trim();
    if field.is_empty() {
        return RecordActionResponse::failure("image field cannot be empty");
    }

    let result = with_service(&partition, |service| {
        let stored = service.upsert_with_image(
            record,
            installed_uploader(),
            field,
            file_name.trim(),
            &image_bytes,
        );
        let has_image = stored.get(field).is_some();
        Ok((stored, has_image))
    });
    match result {
        Ok((stored, has_image)) => {
            let message = if has_image {
                "Record saved with image."
            } else {
                "Record saved without image."
            };
            RecordActionResponse::success(message, Some(stored.id.to_string()))
        }
        Err(err) => {
            RecordActionResponse::failure(format!("partition_upsert_with_image failed: {err}"))
        }
    }
}

/// Deletes one record by id.
///
/// Seed-backed records reappear on the next list; use
/// `partition_hide_seed` to hide them durably.
#[flutter_rust_bridge::frb(sync)]
pub fn partition_delete(partition: String, record_id: String) -> RecordActionResponse {
    let id = RecordId::new(record_id.trim());
    match with_service(&partition, |service| Ok(service.delete(&id))) {
        Ok(true) => RecordActionResponse::success("Record deleted.", Some(id.to_string())),
        Ok(false) => RecordActionResponse::failure(format!("record not found: {id}")),
        Err(err) => RecordActionResponse::failure(format!("partition_delete failed: {err}")),
    }
}

/// Hides a seed record by business key.
#[flutter_rust_bridge::frb(sync)]
pub fn partition_hide_seed(partition: String, business_key: String) -> RecordActionResponse {
    match with_service(&partition, |service| Ok(service.hide_seed(&business_key))) {
        Ok(true) => RecordActionResponse::success("Seed record hidden.", None),
        Ok(false) => RecordActionResponse::failure(format!(
            "no seed record with key `{}`",
            business_key.trim()
        )),
        Err(err) => RecordActionResponse::failure(format!("partition_hide_seed failed: {err}")),
    }
}

/// Removes the tombstone hiding a seed record.
#[flutter_rust_bridge::frb(sync)]
pub fn partition_unhide_seed(partition: String, business_key: String) -> RecordActionResponse {
    match with_service(&partition, |service| Ok(service.unhide_seed(&business_key))) {
        Ok(true) => RecordActionResponse::success("Seed record restored.", None),
        Ok(false) => RecordActionResponse::failure(format!(
            "seed record `{}` is not hidden",
            business_key.trim()
        )),
        Err(err) => RecordActionResponse::failure(format!("partition_unhide_seed failed: {err}")),
    }
}

/// Exports the merged view of `partition` as CSV text.
#[flutter_rust_bridge::frb(sync)]
pub fn partition_export_csv(partition: String) -> CsvExportResponse {
    let result = with_service(&partition, |service| {
        let schema = service.schema();
        Ok((
            export_file_name(schema, Utc::now()),
            export_csv(schema, &service.get_all()),
        ))
    });
    match result {
        Ok((file_name, csv)) => CsvExportResponse {
            ok: true,
            file_name,
            csv,
            message: "Export ready.".to_string(),
        },
        Err(err) => CsvExportResponse {
            ok: false,
            file_name: String::new(),
            csv: String::new(),
            message: format!("partition_export_csv failed: {err}"),
        },
    }
}

/// Imports CSV text into `partition` by appending every valid row.
#[flutter_rust_bridge::frb(sync)]
pub fn partition_import_csv(partition: String, csv: String) -> CsvImportResponse {
    match with_service(&partition, |service| Ok(import_csv(service, &csv))) {
        Ok(report) => CsvImportResponse {
            ok: true,
            imported: u32::try_from(report.imported).unwrap_or(u32::MAX),
            skipped_rows: report
                .skipped_rows
                .iter()
                .map(|line| u32::try_from(*line).unwrap_or(u32::MAX))
                .collect(),
            message: format!(
                "Imported {} row(s), skipped {}.",
                report.imported,
                report.skipped_rows.len()
            ),
        },
        Err(err) => CsvImportResponse {
            ok: false,
            imported: 0,
            skipped_rows: Vec::new(),
            message: format!("partition_import_csv failed: {err}"),
        },
    }
}

fn decode_record(record_json: &str) -> Result<Record, RecordActionResponse> {
    serde_json::from_str::<Record>(record_json)
        .map(|record| clear_placeholder_id(record_json, record))
        .map_err(|err| RecordActionResponse::failure(format!("invalid record JSON: {err}")))
}

/// Record decoding fills a missing or blank `id` with a generated one; new
/// form rows must reach `upsert` with an empty id instead.
fn clear_placeholder_id(raw: &str, mut record: Record) -> Record {
    let has_id = serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|value| value.as_object().and_then(Record::stored_id))
        .is_some();
    if !has_id {
        record.id = RecordId::default();
    }
    record
}

fn resolve_db_path() -> PathBuf {
    STORE_CONFIG
        .get_or_init(|| StoreConfig::from_env().unwrap_or_default())
        .db_path
        .clone()
}

fn with_service<T>(
    partition: &str,
    f: impl FnOnce(&ReconcileService<'_, SqliteKvStore<'_>>) -> Result<T, String>,
) -> Result<T, String> {
    let schema = resolve_partition(partition).map_err(|err| err.to_string())?;
    let conn = open_db(resolve_db_path()).map_err(|err| {
        warn!(
            "event=ffi_store_open module=ffi status=error partition={} error={err}",
            schema.partition
        );
        format!("store open failed: {err}")
    })?;
    let service =
        ReconcileService::open(SqliteKvStore::new(&conn), schema, SeedRegistry::builtin());
    f(&service)
}

#[cfg(test)]
mod tests {
    use super::{
        clear_placeholder_id, core_version, init_logging, partition_delete, partition_export_csv,
        partition_hide_seed, partition_import_csv, partition_list, partition_upsert,
        partition_unhide_seed, partition_upsert_with_image, ping,
    };
    use roster_core::Record;
    use serde_json::Value;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn unknown_partition_fails_without_panicking() {
        let response = partition_list("visas".to_string());
        assert!(!response.ok);
        assert_eq!(response.records_json, "[]");
        assert!(response.message.contains("unknown partition"));
    }

    #[test]
    fn upsert_then_delete_passport_container() {
        let number = unique_token("BOX");
        let created = partition_upsert(
            "passport_containers".to_string(),
            format!(r#"{{"id":"","containerNumber":"{number}","capacity":50}}"#),
        );
        assert!(created.ok, "{}", created.message);
        let id = created.record_id.expect("upsert should return id");

        let listed = partition_list("passport_containers".to_string());
        let records: Value = serde_json::from_str(&listed.records_json).unwrap();
        assert!(records
            .as_array()
            .unwrap()
            .iter()
            .any(|record| record["id"] == id.as_str() && record["capacity"] == 50));

        assert!(partition_delete("passport_containers".to_string(), id.clone()).ok);
        assert!(!partition_delete("passport_containers".to_string(), id).ok);
    }

    #[test]
    fn invalid_record_json_is_reported() {
        let response = partition_upsert("organizers".to_string(), "[1,2]".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("invalid record JSON"));
    }

    #[test]
    fn numeric_id_is_kept_and_blank_id_is_cleared() {
        let numeric = clear_placeholder_id(r#"{"id":42}"#, Record::new());
        assert_eq!(numeric.id.as_str(), "42");
        let blank = clear_placeholder_id(r#"{"id":"  "}"#, Record::new());
        assert!(blank.id.is_empty());
    }

    #[test]
    fn edit_with_numeric_id_replaces_existing_record() {
        let numeric_id = unique_number();
        let before = unique_token("BOX");
        let after = unique_token("BOX");
        let created = partition_upsert(
            "passport_containers".to_string(),
            format!(r#"{{"id":{numeric_id},"containerNumber":"{before}"}}"#),
        );
        assert!(created.ok, "{}", created.message);
        assert_eq!(created.record_id.as_deref(), Some(numeric_id.to_string().as_str()));

        let edited = partition_upsert(
            "passport_containers".to_string(),
            format!(r#"{{"id":{numeric_id},"containerNumber":"{after}"}}"#),
        );
        assert!(edited.ok, "{}", edited.message);

        let listed = partition_list("passport_containers".to_string());
        let records: Value = serde_json::from_str(&listed.records_json).unwrap();
        let matching = records
            .as_array()
            .unwrap()
            .iter()
            .filter(|record| record["id"] == numeric_id.to_string().as_str())
            .collect::<Vec<_>>();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0]["containerNumber"], after.as_str());
    }

    #[test]
    fn upsert_with_image_saves_record_without_installed_uploader() {
        let number = unique_token("BOX");
        let response = partition_upsert_with_image(
            "passport_containers".to_string(),
            format!(r#"{{"containerNumber":"{number}","labelUrl":"stale"}}"#),
            "labelUrl".to_string(),
            "label.png".to_string(),
            b"png".to_vec(),
        );
        assert!(response.ok, "{}", response.message);
        assert_eq!(response.message, "Record saved without image.");

        let listed = partition_list("passport_containers".to_string());
        let records: Value = serde_json::from_str(&listed.records_json).unwrap();
        let stored = records
            .as_array()
            .unwrap()
            .iter()
            .find(|record| record["containerNumber"] == number.as_str())
            .expect("record should be listed");
        assert!(stored.get("labelUrl").is_none());
    }

    #[test]
    fn hide_seed_requires_known_seed_key() {
        let response = partition_hide_seed("organizers".to_string(), unique_token("ORG"));
        assert!(!response.ok);
        let response = partition_unhide_seed("organizers".to_string(), unique_token("ORG"));
        assert!(!response.ok);
        assert!(response.message.contains("is not hidden"));
    }

    #[test]
    fn export_and_import_report_counts() {
        let exported = partition_export_csv("hr_employees".to_string());
        assert!(exported.ok, "{}", exported.message);
        assert!(exported.file_name.starts_with("hr_employees_"));
        assert!(exported.csv.starts_with("id,fullName,"));

        let name = unique_token("Imported");
        let imported = partition_import_csv(
            "hr_employees".to_string(),
            format!("fullName,department\n{name},HR\nbroken\n"),
        );
        assert!(imported.ok, "{}", imported.message);
        assert_eq!(imported.imported, 1);
        assert_eq!(imported.skipped_rows, vec![3]);
    }

    fn unique_number() -> u64 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        u64::try_from(nanos % 1_000_000_000_000_000).expect("fits in u64")
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
