use primesync_core::{
    open_db_in_memory, CancelFlag, EntityKind, ErrorKind, ImportConfig, ImportError, Importer,
    RepoError, SourceDocument, SqliteEntityRepository,
};
use rusqlite::Connection;

mod common;
use common::{authorships, bibliography_xml, count};

fn importer(conn: &Connection) -> Importer<SqliteEntityRepository<'_>> {
    Importer::new(SqliteEntityRepository::new(conn), ImportConfig::default())
}

#[test]
fn importing_the_same_document_twice_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let importer = importer(&conn);
    let doc = bibliography_xml("b00014319", &["W. Tsang", "R. F. Hampson"], "Kinetic data base");

    let first = importer.import_document(doc.as_bytes()).unwrap();
    assert!(first.was_created);
    assert_eq!(first.kind, EntityKind::Bibliography);
    assert_eq!(first.linked, 2);

    let second = importer.import_document(doc.as_bytes()).unwrap();
    assert!(!second.was_created);
    assert_eq!(second.key, first.key);

    assert_eq!(count(&conn, "sources"), 1);
    assert_eq!(count(&conn, "authors"), 2);
    assert_eq!(count(&conn, "authorships"), 2);
}

#[test]
fn reimport_replaces_author_order() {
    let conn = open_db_in_memory().unwrap();
    let importer = importer(&conn);

    importer
        .import_document(bibliography_xml("b00000001", &["A", "B", "C"], "T").as_bytes())
        .unwrap();
    assert_eq!(
        authorships(&conn, "b00000001"),
        vec![("A".into(), 1), ("B".into(), 2), ("C".into(), 3)]
    );

    importer
        .import_document(bibliography_xml("b00000001", &["C", "A", "B"], "T").as_bytes())
        .unwrap();
    assert_eq!(
        authorships(&conn, "b00000001"),
        vec![("C".into(), 1), ("A".into(), 2), ("B".into(), 3)]
    );
    assert_eq!(count(&conn, "authorships"), 3);

    importer
        .import_document(bibliography_xml("b00000001", &["C"], "T").as_bytes())
        .unwrap();
    assert_eq!(authorships(&conn, "b00000001"), vec![("C".into(), 1)]);
    assert_eq!(count(&conn, "authors"), 3);
}

#[test]
fn authors_are_shared_across_sources_by_normalized_name() {
    let conn = open_db_in_memory().unwrap();
    let importer = importer(&conn);
    importer
        .import_document(bibliography_xml("b00000001", &["W.  Tsang"], "T1").as_bytes())
        .unwrap();
    importer
        .import_document(bibliography_xml("b00000002", &[" W. Tsang "], "T2").as_bytes())
        .unwrap();

    assert_eq!(count(&conn, "authors"), 1);
    assert_eq!(authorships(&conn, "b00000002"), vec![("W. Tsang".into(), 1)]);
}

#[test]
fn truncated_document_in_a_batch_is_isolated() {
    let conn = open_db_in_memory().unwrap();
    let importer = importer(&conn);

    let mut documents: Vec<SourceDocument> = (1..=5)
        .map(|n| {
            let doc = bibliography_xml(&format!("b0000000{n}"), &["Shared", &format!("Own {n}")], "T");
            SourceDocument::Bytes {
                path: Some(format!("b0000000{n}.xml").into()),
                bytes: doc.into_bytes(),
            }
        })
        .collect();
    if let SourceDocument::Bytes { bytes, .. } = &mut documents[2] {
        bytes.truncate(bytes.len() / 2);
    }

    let report = importer.import_batch(documents, &CancelFlag::new());
    assert_eq!(report.succeeded.len(), 4);
    assert_eq!(report.failures.len(), 1);

    let failure = &report.failures[0];
    assert_eq!(failure.error_kind, ErrorKind::MalformedDocument);
    assert_eq!(
        failure.path.as_deref(),
        Some(std::path::Path::new("b00000003.xml"))
    );

    assert_eq!(count(&conn, "sources"), 4);
    assert_eq!(count(&conn, "authorships"), 8);
    let third: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM authors WHERE name = 'Own 3';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(third, 0);
}

#[test]
fn schema_violation_rolls_back_and_is_reported() {
    let conn = open_db_in_memory().unwrap();
    let importer = importer(&conn);
    let doc = r#"<bibliography xmlns="http://purl.org/NET/prime/" primeID="b00000009"><author>A</author><title>T</title><year>soon</year></bibliography>"#;

    let err = importer.import_document(doc.as_bytes()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    assert_eq!(count(&conn, "authors"), 0);

    let report = importer.import_batch([SourceDocument::from_bytes(doc)], &CancelFlag::new());
    assert_eq!(report.failures[0].prime_id.as_deref(), Some("b00000009"));
    assert_eq!(report.failures[0].kind, Some(EntityKind::Bibliography));
}

#[test]
fn blank_year_imports_without_a_year() {
    let conn = open_db_in_memory().unwrap();
    let doc = r#"<bibliography xmlns="http://purl.org/NET/prime/" primeID="b00000010"><author>A</author><title>T</title><year/></bibliography>"#;

    let summary = importer(&conn).import_document(doc.as_bytes()).unwrap();
    assert!(summary.was_created);
    let year: Option<i64> = conn
        .query_row(
            "SELECT pub_year FROM sources WHERE prime_id = 'b00000010';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(year, None);
}

#[test]
fn malformed_identifier_is_rejected_before_any_write() {
    let conn = open_db_in_memory().unwrap();
    let err = importer(&conn)
        .import_document(bibliography_xml("bb0001", &["A"], "T").as_bytes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedIdentifier);
    assert_eq!(count(&conn, "authors"), 0);
}

#[test]
fn cancelled_batch_skips_remaining_documents() {
    let conn = open_db_in_memory().unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let documents = (1..=3).map(|n| {
        SourceDocument::from_bytes(bibliography_xml(&format!("b0000000{n}"), &["A"], "T"))
    });

    let report = importer(&conn).import_batch(documents, &cancel);
    assert!(report.succeeded.is_empty());
    assert_eq!(report.failures.len(), 3);
    assert!(report
        .failures
        .iter()
        .all(|failure| failure.error_kind == ErrorKind::Cancelled));
    assert_eq!(count(&conn, "sources"), 0);
}

#[test]
fn report_serializes_for_tooling() {
    let conn = open_db_in_memory().unwrap();
    let report = importer(&conn).import_batch(
        [
            SourceDocument::from_bytes(bibliography_xml("b00000001", &["A"], "T")),
            SourceDocument::from_bytes("<bibliography"),
        ],
        &CancelFlag::new(),
    );
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["succeeded"][0]["prime_id"], "b00000001");
    assert_eq!(value["succeeded"][0]["kind"], "bibliography");
    assert_eq!(value["failures"][0]["error_kind"], "MalformedDocument");
    assert!(value["run_id"].as_str().is_some());
}

#[test]
fn writes_outside_a_transaction_are_refused() {
    use primesync_core::{EntityStore, PrimeId, Source};
    use primesync_core::repo::SqliteStore;

    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::new(&conn);
    let source = Source::new(PrimeId::new(EntityKind::Bibliography, 1).unwrap(), "T");
    assert!(matches!(
        store.upsert_source(&source),
        Err(RepoError::TransactionRequired)
    ));
    assert!(matches!(
        store.upsert_author("A"),
        Err(RepoError::TransactionRequired)
    ));
}

#[test]
fn import_error_exposes_its_source() {
    let conn = open_db_in_memory().unwrap();
    let err = importer(&conn).import_document(b"<bibliography").unwrap_err();
    assert!(matches!(err, ImportError::Codec(_)));
    assert!(std::error::Error::source(&err).is_some());
}
