use roster_core::{
    decode_csv, export_csv, import_csv, FieldValue, MemoryKvStore, Record, RecordId,
    ReconcileService, SeedRegistry, EMPLOYEES, ORGANIZERS,
};

fn comparable(records: &[Record]) -> Vec<(Vec<(String, String)>, String)> {
    records
        .iter()
        .map(|record| {
            let fields = record
                .fields
                .iter()
                .map(|(key, value)| (key.clone(), value.to_text()))
                .collect();
            (fields, record.created_at.clone())
        })
        .collect()
}

#[test]
fn round_trip_preserves_values_with_comma_quote_and_newline() {
    let records = vec![
        Record::with_id(RecordId::new("o-1"))
            .field("createdAt", "2024-01-01T00:00:00.000Z")
            .field("organizerNumber", "ORG-1")
            .field("company", "Acme, \"The Best\"\nTravel")
            .field("city", "Riyadh"),
        Record::with_id(RecordId::new("o-2"))
            .field("createdAt", "2024-01-02T00:00:00.000Z")
            .field("organizerNumber", "ORG-2")
            .field("company", "Plain"),
    ];

    let text = export_csv(&ORGANIZERS, &records);
    let decoded = decode_csv(&ORGANIZERS, &text);

    assert!(decoded.report.skipped_rows.is_empty());
    assert_eq!(comparable(&decoded.records), comparable(&records));
    assert!(decoded
        .records
        .iter()
        .all(|record| record.id.as_str() != "o-1" && record.id.as_str() != "o-2"));
}

#[test]
fn export_stringifies_values_and_leaves_absent_fields_empty() {
    let record = Record::with_id(RecordId::new("EMP-9"))
        .field("createdAt", "2024-01-01T00:00:00.000Z")
        .field("fullName", "Dana")
        .field("salary", 5100)
        .field("status", FieldValue::Null);

    let text = export_csv(&EMPLOYEES, &[record]);
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "id,fullName,department,position,phone,email,nationality,\
         hireDate,salary,status,photoUrl,createdAt"
    );
    assert_eq!(
        lines.next().unwrap(),
        "EMP-9,Dana,,,,,,,5100,,,2024-01-01T00:00:00.000Z"
    );
    assert!(lines.next().is_none());
}

#[test]
fn short_row_is_skipped_without_aborting_later_rows() {
    let text = "organizerNumber,company,city\r\n\
                ORG-1,Acme,Riyadh\r\nORG-2,Short\r\nORG-3,Gamma,Jeddah\r\n";
    let decoded = decode_csv(&ORGANIZERS, text);

    assert_eq!(decoded.report.imported, 2);
    assert_eq!(decoded.report.skipped_rows, vec![3]);
    let numbers = decoded
        .records
        .iter()
        .filter_map(|record| record.text("organizerNumber"))
        .collect::<Vec<_>>();
    assert_eq!(numbers, vec!["ORG-1", "ORG-3"]);
}

#[test]
fn import_appends_without_merging_by_business_key() {
    let store = MemoryKvStore::new();
    let seeds = SeedRegistry::empty();
    let service = ReconcileService::open(&store, &ORGANIZERS, &seeds);
    service.upsert(Record::new().field("organizerNumber", "ORG-1").field("company", "Old"));

    let report = import_csv(
        &service,
        "organizer number,company\nORG-1,Imported\nORG-5,Fresh\n",
    );
    assert_eq!(report.imported, 2);

    let overlay = service.overlay().load();
    let org1_rows = overlay
        .iter()
        .filter(|record| record.text("organizerNumber").as_deref() == Some("ORG-1"))
        .count();
    assert_eq!(org1_rows, 2);
    assert_eq!(overlay.len(), 3);

    let merged = service.get_all();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].text("company").as_deref(), Some("Imported"));
}

#[test]
fn import_of_exported_seed_partition_keeps_merged_view_stable() {
    let store = MemoryKvStore::new();
    let service = ReconcileService::open(&store, &ORGANIZERS, SeedRegistry::builtin());

    let text = export_csv(&ORGANIZERS, &service.get_all());
    let report = import_csv(&service, &text);

    assert_eq!(report.imported, 3);
    let merged = service.get_all();
    assert_eq!(merged.len(), 3);
    assert_eq!(
        comparable(&merged),
        comparable(SeedRegistry::builtin().list(&ORGANIZERS))
    );
}
