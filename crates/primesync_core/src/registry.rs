//! Identifier registry: validation, allocation and resolution of PrIMe ids.
//!
//! # Responsibility
//! - Validate external identifiers against their kind pattern.
//! - Hand out the next unused identifier per kind.
//! - Map external identifiers to internal storage keys.
//!
//! # Invariants
//! - `next` never returns the same id twice, even when the caller's later
//!   write fails, because allocation commits on its own.
//! - The per-kind counter is always >= the largest stored id number.

use crate::db::DbError;
use crate::model::ids::{EntityKind, MalformedIdentifier, PrimeId};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Internal storage key (SQLite rowid).
pub type RowKey = i64;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug)]
pub enum RegistryError {
    Malformed(MalformedIdentifier),
    NotFound(PrimeId),
    /// Counter reached `PrimeId::MAX_NUMBER`.
    Exhausted(EntityKind),
    /// `next` was called while the connection had an open transaction.
    InsideTransaction,
    Db(DbError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "{} not found: {id}", id.kind()),
            Self::Exhausted(kind) => write!(f, "{kind} identifier space exhausted"),
            Self::InsideTransaction => write!(
                f,
                "identifier allocation must run outside an open transaction"
            ),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MalformedIdentifier> for RegistryError {
    fn from(value: MalformedIdentifier) -> Self {
        Self::Malformed(value)
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Checks `id` against the identifier pattern of `kind`.
pub fn validate(kind: EntityKind, id: &str) -> Result<PrimeId, MalformedIdentifier> {
    PrimeId::parse(kind, id)
}

/// Parses an identifier of any kind.
pub fn parse_any(id: &str) -> Result<PrimeId, MalformedIdentifier> {
    PrimeId::parse_any(id)
}

/// Registry contract consumed by importer and exporter.
pub trait IdentifierRegistry {
    /// Allocates the next unused identifier for `kind`.
    fn next(&self, kind: EntityKind) -> RegistryResult<PrimeId>;
    /// Resolves an identifier to its internal storage key.
    fn resolve(&self, id: &PrimeId) -> RegistryResult<RowKey>;
    /// Records that `id` is in use so `next` never hands it out.
    fn observe(&self, id: &PrimeId) -> RegistryResult<()>;
}

/// SQLite-backed registry over `id_counters` and the entity tables.
pub struct SqliteIdentifierRegistry<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIdentifierRegistry<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl IdentifierRegistry for SqliteIdentifierRegistry<'_> {
    fn next(&self, kind: EntityKind) -> RegistryResult<PrimeId> {
        if !self.conn.is_autocommit() {
            return Err(RegistryError::InsideTransaction);
        }

        // Single statement: the increment is atomic across connections.
        let allocated: Option<i64> = self
            .conn
            .query_row(
                "UPDATE id_counters
                 SET last_value = last_value + 1
                 WHERE kind = ?1 AND last_value < ?2
                 RETURNING last_value;",
                params![kind.as_str(), i64::from(PrimeId::MAX_NUMBER)],
                |row| row.get(0),
            )
            .optional()?;

        let Some(number) = allocated else {
            warn!(
                "event=id_allocate module=registry status=error kind={} error_code=exhausted",
                kind
            );
            return Err(RegistryError::Exhausted(kind));
        };
        let number = u32::try_from(number).map_err(|_| RegistryError::Exhausted(kind))?;
        let id = PrimeId::new(kind, number)?;
        debug!(
            "event=id_allocate module=registry status=ok kind={} prime_id={}",
            kind, id
        );
        Ok(id)
    }

    fn resolve(&self, id: &PrimeId) -> RegistryResult<RowKey> {
        resolve_in(self.conn, id)?.ok_or(RegistryError::NotFound(*id))
    }

    fn observe(&self, id: &PrimeId) -> RegistryResult<()> {
        observe_in(self.conn, id)
    }
}

pub(crate) fn entity_table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Bibliography => "sources",
        EntityKind::Species => "species",
        EntityKind::Reaction => "reactions",
        EntityKind::KineticsModel => "kin_models",
    }
}

pub(crate) fn resolve_in(conn: &Connection, id: &PrimeId) -> RegistryResult<Option<RowKey>> {
    let key = conn
        .query_row(
            &format!(
                "SELECT id FROM {} WHERE prime_id = ?1;",
                entity_table(id.kind())
            ),
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(key)
}

pub(crate) fn observe_in(conn: &Connection, id: &PrimeId) -> RegistryResult<()> {
    conn.execute(
        "UPDATE id_counters
         SET last_value = MAX(last_value, ?2)
         WHERE kind = ?1;",
        params![id.kind().as_str(), i64::from(id.number())],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate, IdentifierRegistry, RegistryError, SqliteIdentifierRegistry};
    use crate::db::open_db_in_memory;
    use crate::model::ids::{EntityKind, PrimeId};

    #[test]
    fn validate_accepts_species_pattern_and_reports_offender() {
        assert!(validate(EntityKind::Species, "s00010102").is_ok());
        let err = validate(EntityKind::Species, "ss001").unwrap_err();
        assert_eq!(err.value, "ss001");
    }

    #[test]
    fn next_is_monotonic_and_skips_observed_ids() {
        let conn = open_db_in_memory().unwrap();
        let registry = SqliteIdentifierRegistry::new(&conn);

        let first = registry.next(EntityKind::Species).unwrap();
        assert_eq!(first.to_string(), "s00000001");

        registry
            .observe(&PrimeId::new(EntityKind::Species, 41).unwrap())
            .unwrap();
        let second = registry.next(EntityKind::Species).unwrap();
        assert_eq!(second.to_string(), "s00000042");

        // Observing a lower number never moves the counter back.
        registry.observe(&first).unwrap();
        assert_eq!(registry.next(EntityKind::Species).unwrap().number(), 43);

        // Kinds are independent.
        assert_eq!(registry.next(EntityKind::Reaction).unwrap().number(), 1);
    }

    #[test]
    fn next_refuses_inside_transaction() {
        let mut conn = open_db_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        let registry = SqliteIdentifierRegistry::new(&tx);
        assert!(matches!(
            registry.next(EntityKind::Bibliography),
            Err(RegistryError::InsideTransaction)
        ));
    }

    #[test]
    fn next_reports_exhaustion() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "UPDATE id_counters SET last_value = 99999999 WHERE kind = 'reaction';",
            [],
        )
        .unwrap();
        let registry = SqliteIdentifierRegistry::new(&conn);
        assert!(matches!(
            registry.next(EntityKind::Reaction),
            Err(RegistryError::Exhausted(EntityKind::Reaction))
        ));
    }

    #[test]
    fn resolve_unknown_is_not_found() {
        let conn = open_db_in_memory().unwrap();
        let registry = SqliteIdentifierRegistry::new(&conn);
        let id = PrimeId::new(EntityKind::Species, 5).unwrap();
        assert!(matches!(registry.resolve(&id), Err(RegistryError::NotFound(found)) if found == id));
    }
}
