//! Core of primesync: PrIMe interchange XML to and from a relational store.
//! Owns identifier rules, the document codec, persistence, and batch runs.

pub mod batch;
pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;

pub use batch::{
    import_paths_parallel, BatchReport, CancelFlag, ErrorKind, ExportReport, FailureRecord,
    SourceDocument,
};
pub use codec::{decode_document, encode, encode_to_bytes, CodecError, DecodedDocument};
pub use config::{ConfigError, ExportConfig, ImportConfig, StoreConfig, SyncConfig};
pub use db::{open_db, open_db_in_memory, open_db_with, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::ids::{EntityKind, MalformedIdentifier, PrimeId};
pub use model::kinetics::{KinModel, Kinetics, RateExpression, RateParameter};
pub use model::reaction::{Reaction, Stoichiometry};
pub use model::source::Source;
pub use model::species::{Composition, PreferredKey, Species, TypedIdentifier};
pub use registry::{IdentifierRegistry, RegistryError, SqliteIdentifierRegistry};
pub use repo::{EntityRepository, EntityStore, RepoError, RepoResult, SqliteEntityRepository};
pub use service::exporter::{ExportError, Exporter};
pub use service::importer::{EntitySummary, ImportError, Importer};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
