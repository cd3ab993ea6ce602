//! Repository layer: entity persistence contracts and their SQLite backing.
//!
//! # Responsibility
//! - Define the upsert/find/transaction contract used by import and export.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce record `validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

pub mod entity_repo;
pub mod sqlite_store;

pub use entity_repo::{
    EntityRepository, EntityStore, KineticsLink, RepoError, RepoResult, SqliteEntityRepository,
    Upserted,
};
pub use sqlite_store::SqliteStore;
