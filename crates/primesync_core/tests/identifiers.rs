use primesync_core::registry::{parse_any, validate};
use primesync_core::{
    open_db_in_memory, EntityKind, IdentifierRegistry, Importer, ImportConfig,
    SqliteEntityRepository, SqliteIdentifierRegistry,
};

mod common;

#[test]
fn validate_enforces_kind_pattern() {
    let id = validate(EntityKind::Species, "s00010102").unwrap();
    assert_eq!(id.number(), 10102);

    for bad in ["ss001", "s0001010", "b00010102", "s000101020", "s00000000", ""] {
        let err = validate(EntityKind::Species, bad).unwrap_err();
        assert_eq!(err.value, bad);
        assert_eq!(err.expected, Some(EntityKind::Species));
    }
}

#[test]
fn parse_any_infers_kind_from_prefix() {
    assert_eq!(parse_any("k00000012").unwrap().kind(), EntityKind::KineticsModel);
    assert_eq!(parse_any("r00000001").unwrap().kind(), EntityKind::Reaction);
    assert!(parse_any("x00000001").is_err());
}

#[test]
fn next_skips_identifiers_claimed_by_import() {
    let conn = open_db_in_memory().unwrap();
    let importer = Importer::new(SqliteEntityRepository::new(&conn), ImportConfig::default());
    importer
        .import_document(common::bibliography_xml("b00000120", &["A"], "T").as_bytes())
        .unwrap();

    let registry = SqliteIdentifierRegistry::new(&conn);
    assert_eq!(
        registry.next(EntityKind::Bibliography).unwrap().to_string(),
        "b00000121"
    );
    assert_eq!(
        registry.next(EntityKind::Bibliography).unwrap().to_string(),
        "b00000122"
    );
}

#[test]
fn allocated_ids_are_never_reused_after_failed_writes() {
    let conn = open_db_in_memory().unwrap();
    let registry = SqliteIdentifierRegistry::new(&conn);
    let first = registry.next(EntityKind::Species).unwrap();

    // A rolled back write does not return the id to the pool.
    conn.execute_batch("BEGIN; INSERT INTO species (prime_id, preferred_key) VALUES ('s00000001', 'H'); ROLLBACK;")
        .unwrap();
    let second = registry.next(EntityKind::Species).unwrap();
    assert!(second.number() > first.number());
}
