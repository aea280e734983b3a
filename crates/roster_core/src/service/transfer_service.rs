//! CSV export/import of merged partitions.
//!
//! # Responsibility
//! - Turn a merged view into delimited text in schema column order.
//! - Turn delimited text into fresh records and append them to a partition.
//!
//! # Invariants
//! - Export header is `id`, the schema fields in order, then `createdAt`.
//! - Import never aborts on a bad row: rows whose cell count differs from
//!   the header are skipped and reported by line number.
//! - Imported records always get fresh ids; import is pure insertion and
//!   never merges by business key.

use crate::codec::csv::{encode_table, normalize_header, parse_rows};
use crate::model::record::{FieldValue, Record, CREATED_AT_FIELD, ID_FIELD};
use crate::model::schema::EntitySchema;
use crate::model::timestamp::{normalize, RawTimestamp};
use crate::repo::kv_store::KeyValueStore;
use crate::service::reconcile_service::ReconcileService;
use chrono::{DateTime, Utc};
use log::info;

/// Outcome counters of one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Number of rows converted into records.
    pub imported: usize,
    /// 1-based starting line numbers of rows skipped for a cell-count mismatch.
    pub skipped_rows: Vec<usize>,
    /// Header cells that matched no known column.
    pub ignored_columns: Vec<String>,
}

/// Records decoded from text plus the report describing the decode.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImport {
    pub records: Vec<Record>,
    pub report: ImportReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Field(&'static str),
    CreatedAt,
    /// Recognized but not imported: ids are always regenerated.
    Id,
    Ignored,
}

/// Encodes records as CSV text using `schema`'s column order.
///
/// Non-text values are stringified; absent values become empty cells.
pub fn export_csv(schema: &EntitySchema, records: &[Record]) -> String {
    let mut header = Vec::with_capacity(schema.fields.len() + 2);
    header.push(ID_FIELD);
    header.extend_from_slice(schema.fields);
    header.push(CREATED_AT_FIELD);

    let rows = records
        .iter()
        .map(|record| {
            let mut row = Vec::with_capacity(header.len());
            row.push(record.id.to_string());
            row.extend(
                schema
                    .fields
                    .iter()
                    .map(|field| record.get(field).map(FieldValue::to_text).unwrap_or_default()),
            );
            row.push(record.created_at.clone());
            row
        })
        .collect::<Vec<_>>();

    encode_table(&header, &rows)
}

/// Export file name: `{partition}_{YYYY-MM-DD}.csv`.
pub fn export_file_name(schema: &EntitySchema, now: DateTime<Utc>) -> String {
    format!("{}_{}.csv", schema.partition, now.format("%Y-%m-%d"))
}

/// Decodes CSV text into fresh records of `schema`.
pub fn decode_csv(schema: &EntitySchema, text: &str) -> DecodedImport {
    let mut rows = parse_rows(text).into_iter();
    let Some(header_row) = rows.next() else {
        return DecodedImport {
            records: Vec::new(),
            report: ImportReport::default(),
        };
    };

    let columns = header_row
        .cells
        .iter()
        .map(|name| resolve_column(schema, name))
        .collect::<Vec<_>>();
    let mut report = ImportReport {
        ignored_columns: header_row
            .cells
            .iter()
            .zip(&columns)
            .filter(|(_, column)| **column == Column::Ignored)
            .map(|(name, _)| name.trim().to_string())
            .collect(),
        ..ImportReport::default()
    };

    let mut records = Vec::new();
    for row in rows {
        if row.cells.len() != columns.len() {
            report.skipped_rows.push(row.line);
            continue;
        }

        let mut record = Record::new();
        for (column, cell) in columns.iter().zip(&row.cells) {
            match *column {
                Column::Field(name) => {
                    if cell.is_empty() {
                        continue;
                    }
                    let value = if schema.is_timestamp_field(name) {
                        normalize(&RawTimestamp::from_text(cell))
                    } else {
                        cell.clone()
                    };
                    record.fields.insert(name.to_string(), FieldValue::Text(value));
                }
                Column::CreatedAt => record.created_at = normalize(&RawTimestamp::from_text(cell)),
                Column::Id | Column::Ignored => {}
            }
        }
        records.push(record);
    }

    report.imported = records.len();
    DecodedImport { records, report }
}

/// Decodes `text` and appends every accepted record to the partition.
///
/// Appended records are not merged by business key; a row repeating an
/// existing key is stored as an additional overlay record.
pub fn import_csv<S: KeyValueStore>(service: &ReconcileService<'_, S>, text: &str) -> ImportReport {
    let schema = service.schema();
    let decoded = decode_csv(schema, text);

    if !decoded.records.is_empty() {
        let mut merged = service.get_all();
        merged.extend(decoded.records);
        service.persist(&merged);
    }

    info!(
        "event=csv_import module=service status=ok partition={} imported={} skipped={} ignored_columns={}",
        schema.partition,
        decoded.report.imported,
        decoded.report.skipped_rows.len(),
        decoded.report.ignored_columns.len()
    );
    decoded.report
}

fn resolve_column(schema: &EntitySchema, header: &str) -> Column {
    let normalized = normalize_header(header);
    if normalized == normalize_header(ID_FIELD) {
        return Column::Id;
    }
    if normalized == normalize_header(CREATED_AT_FIELD) {
        return Column::CreatedAt;
    }
    schema
        .fields
        .iter()
        .find(|field| normalize_header(field) == normalized)
        .map_or(Column::Ignored, |field| Column::Field(*field))
}

#[cfg(test)]
mod tests {
    use super::{decode_csv, export_file_name};
    use crate::model::schema::{EMPLOYEES, ORGANIZERS};
    use chrono::{TimeZone, Utc};

    #[test]
    fn file_name_uses_partition_and_date() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 0).unwrap();
        assert_eq!(
            export_file_name(&ORGANIZERS, now),
            "organizers_2025-03-09.csv"
        );
    }

    #[test]
    fn headers_match_loosely_and_unknown_columns_are_reported() {
        let decoded = decode_csv(
            &ORGANIZERS,
            "ORGANIZER_NUMBER, Company ,Notes\nORG-7,Acme,ignored\n",
        );
        assert_eq!(decoded.report.ignored_columns, vec!["Notes".to_string()]);
        let record = &decoded.records[0];
        assert_eq!(record.text("organizerNumber").as_deref(), Some("ORG-7"));
        assert_eq!(record.text("company").as_deref(), Some("Acme"));
        assert!(record.get("Notes").is_none());
    }

    #[test]
    fn ids_are_regenerated_and_dates_normalized() {
        let decoded = decode_csv(
            &EMPLOYEES,
            "id,fullName,hireDate,created_at\n\
             EMP-001,Dana,1700000000000,2024-05-01T10:00:00.000Z\n",
        );
        let record = &decoded.records[0];
        assert_ne!(record.id.as_str(), "EMP-001");
        assert_eq!(
            record.text("hireDate").as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
        assert_eq!(record.created_at, "2024-05-01T10:00:00.000Z");
    }

    #[test]
    fn empty_input_decodes_to_nothing() {
        let decoded = decode_csv(&ORGANIZERS, "");
        assert!(decoded.records.is_empty());
        assert_eq!(decoded.report.imported, 0);
    }
}
