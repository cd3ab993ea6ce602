//! Entity repository contracts and transactional SQLite entry point.
//!
//! # Responsibility
//! - Define the narrow upsert/find/transaction contract the importer and
//!   exporter depend on.
//! - Classify SQLite failures into conflict and integrity errors.
//!
//! # Invariants
//! - Every write runs inside `with_transaction`; store writes refuse to run
//!   in autocommit mode.
//! - Upserts are backed by UNIQUE constraints (`ON CONFLICT`), never by a
//!   separate read-then-insert.
//! - A failed `with_transaction` closure rolls back every write it made.

use crate::db::DbError;
use crate::model::ids::{EntityKind, PrimeId};
use crate::model::kinetics::KinModel;
use crate::model::reaction::Reaction;
use crate::model::source::Source;
use crate::model::species::Species;
use crate::model::RecordValidationError;
use crate::registry::{IdentifierRegistry, RegistryError, RowKey};
use crate::repo::sqlite_store::SqliteStore;
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Validation(RecordValidationError),
    Db(DbError),
    NotFound(PrimeId),
    /// Concurrent writer held the database past the busy timeout.
    Conflict(String),
    /// A uniqueness/check/foreign-key constraint rejected the write.
    Integrity(String),
    /// Write attempted outside `with_transaction`.
    TransactionRequired,
    InvalidData(String),
    Registry(RegistryError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "{} not found: {id}", id.kind()),
            Self::Conflict(message) => write!(f, "repository conflict: {message}"),
            Self::Integrity(message) => write!(f, "integrity violation: {message}"),
            Self::TransactionRequired => write!(f, "repository writes require a transaction"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RecordValidationError> for RepoError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        let classified = match &value {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let detail = || message.clone().unwrap_or_else(|| failure.to_string());
                match failure.code {
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                        Some(Self::Conflict(detail()))
                    }
                    ErrorCode::ConstraintViolation => Some(Self::Integrity(detail())),
                    _ => None,
                }
            }
            _ => None,
        };
        classified.unwrap_or_else(|| Self::Db(DbError::Sqlite(value)))
    }
}

impl From<RegistryError> for RepoError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::NotFound(id) => Self::NotFound(id),
            RegistryError::Db(err) => Self::from(err),
            other => Self::Registry(other),
        }
    }
}

/// Result of an idempotent upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub key: RowKey,
    /// `false` when the row already existed and was updated in place.
    pub was_created: bool,
}

/// Resolved storage keys for one kinetics entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KineticsLink {
    pub reaction: RowKey,
    pub source: RowKey,
}

/// Per-entity primitives available inside a repository scope.
pub trait EntityStore {
    /// Identifier registry bound to the same scope.
    fn registry(&self) -> &dyn IdentifierRegistry;

    /// Gets or creates an author by normalized name.
    fn upsert_author(&self, name: &str) -> RepoResult<Upserted>;
    /// Creates or updates source fields (not its authorships).
    fn upsert_source(&self, source: &Source) -> RepoResult<Upserted>;
    /// Replaces the full authorship ordering of one source. Position `i`
    /// of `authors` becomes order `i + 1`.
    fn replace_authorships(&self, source: RowKey, authors: &[RowKey]) -> RepoResult<()>;
    /// Creates or updates a species with its names and composition.
    /// `source` is the resolved key of `species.content`, if any.
    fn upsert_species(&self, species: &Species, source: Option<RowKey>) -> RepoResult<Upserted>;
    /// Creates or updates a reaction. `species` holds one resolved key per
    /// stoichiometry entry, in the same order.
    fn upsert_reaction(&self, reaction: &Reaction, species: &[RowKey]) -> RepoResult<Upserted>;
    /// Creates or updates a model. `links` holds one entry per kinetics entry.
    fn upsert_kin_model(&self, model: &KinModel, links: &[KineticsLink]) -> RepoResult<Upserted>;

    fn find_source(&self, id: &PrimeId) -> RepoResult<Option<Source>>;
    fn find_species(&self, id: &PrimeId) -> RepoResult<Option<Species>>;
    fn find_reaction(&self, id: &PrimeId) -> RepoResult<Option<Reaction>>;
    fn find_kin_model(&self, id: &PrimeId) -> RepoResult<Option<KinModel>>;
    /// All stored identifiers of `kind`, sorted.
    fn list_prime_ids(&self, kind: EntityKind) -> RepoResult<Vec<PrimeId>>;
}

/// Transactional access to an `EntityStore`.
pub trait EntityRepository {
    /// Runs `work` in one write transaction; commits only when it succeeds.
    fn with_transaction<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce(&dyn EntityStore) -> RepoResult<T>;

    /// Runs `work` against one consistent read snapshot.
    fn with_reader<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce(&dyn EntityStore) -> RepoResult<T>;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn with_transaction<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce(&dyn EntityStore) -> RepoResult<T>,
    {
        // Immediate: take the write lock up front so conflicting writers
        // wait on busy_timeout instead of failing mid-transaction.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let value = work(&SqliteStore::new(&tx))?;
        tx.commit()?;
        Ok(value)
    }

    fn with_reader<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce(&dyn EntityStore) -> RepoResult<T>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let value = work(&SqliteStore::new(&tx))?;
        tx.commit()?;
        Ok(value)
    }
}
