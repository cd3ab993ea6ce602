//! Interchange document import.
//!
//! # Responsibility
//! - Decode a document, resolve its references, and upsert the record and
//!   its child collections as one transaction.
//! - Turn every per-document failure into a `FailureRecord` at the batch
//!   boundary.
//!
//! # Invariants
//! - A failed document leaves no writes behind.
//! - Authorship order is replaced, never merged.
//! - `RepoError::Conflict` is retried `ImportConfig::conflict_retries`
//!   times before it is surfaced.

use crate::batch::{
    plan_phases, BatchReport, CancelFlag, ErrorKind, FailureRecord, PreparedDocument,
    SourceDocument,
};
use crate::codec::{self, CodecError, DecodedDocument};
use crate::config::ImportConfig;
use crate::model::ids::{EntityKind, PrimeId};
use crate::registry::RowKey;
use crate::repo::entity_repo::{EntityRepository, EntityStore, KineticsLink, RepoError, RepoResult};
use log::{debug, info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug)]
pub enum ImportError {
    Io { path: PathBuf, source: std::io::Error },
    Codec(CodecError),
    Repo(RepoError),
}

impl ImportError {
    /// Stable classification recorded in failure reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Codec(err) => ErrorKind::from_codec(err),
            Self::Repo(err) => ErrorKind::from_repo(err),
        }
    }
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read `{}`: {source}", path.display()),
            Self::Codec(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Codec(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<CodecError> for ImportError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Outcome of one imported document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub kind: EntityKind,
    pub prime_id: PrimeId,
    /// Internal storage key of the top-level row.
    pub key: RowKey,
    pub was_created: bool,
    /// Number of resolved references (authors, a species source, links).
    pub linked: usize,
}

/// Imports decoded documents through an `EntityRepository`.
pub struct Importer<R: EntityRepository> {
    repo: R,
    config: ImportConfig,
}

impl<R: EntityRepository> Importer<R> {
    pub fn new(repo: R, config: ImportConfig) -> Self {
        Self { repo, config }
    }

    /// Parses, decodes and stores one document.
    pub fn import_document(&self, bytes: &[u8]) -> ImportResult<EntitySummary> {
        let document = codec::decode_document(bytes)?;
        self.store_document(&document)
    }

    /// Reads and imports the document at `path`.
    pub fn import_file(&self, path: &Path) -> ImportResult<EntitySummary> {
        let bytes = std::fs::read(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.import_document(&bytes)
    }

    /// Stores an already decoded document in one transaction.
    pub fn store_document(&self, document: &DecodedDocument) -> ImportResult<EntitySummary> {
        let mut attempt = 0;
        loop {
            match self
                .repo
                .with_transaction(|store| write_document(store, document))
            {
                Err(RepoError::Conflict(message)) if attempt < self.config.conflict_retries => {
                    attempt += 1;
                    warn!(
                        "event=import_retry module=importer status=retry kind={} prime_id={} attempt={} reason={}",
                        document.kind(),
                        document.prime_id(),
                        attempt,
                        message
                    );
                }
                Err(err) => return Err(err.into()),
                Ok(summary) => {
                    debug!(
                        "event=import_document module=importer status=ok kind={} prime_id={} created={} linked={}",
                        summary.kind, summary.prime_id, summary.was_created, summary.linked
                    );
                    return Ok(summary);
                }
            }
        }
    }

    /// Imports one parsed document, reporting failure with its identity.
    pub fn import_prepared(&self, document: &PreparedDocument) -> Result<EntitySummary, FailureRecord> {
        let decoded = codec::decode_element(&document.root)
            .map_err(|err| document.failure(ImportError::from(err)))?;
        self.store_document(&decoded)
            .map_err(|err| document.failure(err))
    }

    /// Imports `documents` sequentially in dependency order.
    ///
    /// One failing document never stops the rest. Once `cancel` is raised
    /// every remaining document is reported as `Cancelled`.
    pub fn import_batch<I>(&self, documents: I, cancel: &CancelFlag) -> BatchReport
    where
        I: IntoIterator<Item = SourceDocument>,
    {
        let mut report = BatchReport::new();
        let (phases, failures) = plan_phases(documents.into_iter().map(SourceDocument::prepare));
        report.failures.extend(failures);

        for (kind, documents) in phases {
            for document in documents {
                if cancel.is_cancelled() {
                    report.failures.push(document.cancelled());
                    continue;
                }
                match self.import_prepared(&document) {
                    Ok(summary) => report.succeeded.push(summary),
                    Err(failure) => report.failures.push(failure),
                }
            }
            debug!(
                "event=import_phase module=importer status=done run_id={} kind={}",
                report.run_id, kind
            );
        }

        info!(
            "event=import_batch module=importer status={} run_id={} succeeded={} failed={}",
            if report.failures.is_empty() { "ok" } else { "partial" },
            report.run_id,
            report.succeeded.len(),
            report.failures.len()
        );
        report
    }
}

fn write_document(store: &dyn EntityStore, document: &DecodedDocument) -> RepoResult<EntitySummary> {
    let registry = store.registry();
    let (upserted, linked) = match document {
        DecodedDocument::Source(decoded) => {
            let source = &decoded.record;
            let mut authors = Vec::with_capacity(source.authors.len());
            for name in &source.authors {
                authors.push(store.upsert_author(name)?.key);
            }
            let upserted = store.upsert_source(source)?;
            store.replace_authorships(upserted.key, &authors)?;
            (upserted, authors.len())
        }
        DecodedDocument::Species(decoded) => {
            let species = &decoded.record;
            let source = species
                .content
                .as_ref()
                .map(|id| registry.resolve(id))
                .transpose()?;
            (store.upsert_species(species, source)?, usize::from(source.is_some()))
        }
        DecodedDocument::Reaction(decoded) => {
            let reaction = &decoded.record;
            let mut species = Vec::with_capacity(reaction.stoichiometry.len());
            for entry in &reaction.stoichiometry {
                species.push(registry.resolve(&entry.species)?);
            }
            (store.upsert_reaction(reaction, &species)?, species.len())
        }
        DecodedDocument::KinModel(decoded) => {
            let model = &decoded.record;
            let mut links = Vec::with_capacity(model.kinetics.len());
            for entry in &model.kinetics {
                links.push(KineticsLink {
                    reaction: registry.resolve(&entry.reaction)?,
                    source: registry.resolve(&entry.source)?,
                });
            }
            (store.upsert_kin_model(model, &links)?, links.len())
        }
    };

    Ok(EntitySummary {
        kind: document.kind(),
        prime_id: document.prime_id(),
        key: upserted.key,
        was_created: upserted.was_created,
        linked,
    })
}
