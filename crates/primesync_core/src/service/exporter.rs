//! Interchange document export.
//!
//! # Responsibility
//! - Load a stored record by identifier and encode it through the codec.
//! - Write one `<primeID>.xml` file per record into a target directory.
//!
//! # Invariants
//! - Identifiers are validated before any storage read.
//! - Export only reads; it runs inside `with_reader`.
//! - An existing output file is replaced, never appended to.
//! - Files are written to a temporary sibling and renamed into place, so a
//!   failed write never leaves a truncated `<primeID>.xml`.

use crate::batch::{ErrorKind, ExportReport, FailureRecord};
use crate::codec::{self, CodecError, PrimeDocument};
use crate::config::ExportConfig;
use crate::model::ids::{EntityKind, MalformedIdentifier, PrimeId};
use crate::registry;
use crate::repo::entity_repo::{EntityRepository, EntityStore, RepoError, RepoResult};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug)]
pub enum ExportError {
    Malformed(MalformedIdentifier),
    NotFound(PrimeId),
    /// Stored record cannot be encoded (e.g. a required field is blank).
    Codec(CodecError),
    Repo(RepoError),
    Io { path: PathBuf, source: std::io::Error },
    /// Target exists and `ExportConfig::overwrite` is off.
    Exists(PathBuf),
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(_) => ErrorKind::MalformedIdentifier,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Codec(err) => ErrorKind::from_codec(err),
            Self::Repo(err) => ErrorKind::from_repo(err),
            Self::Io { .. } | Self::Exists(_) => ErrorKind::Io,
        }
    }
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "{} not found: {id}", id.kind()),
            Self::Codec(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Io { path, source } => {
                write!(f, "failed to write `{}`: {source}", path.display())
            }
            Self::Exists(path) => write!(f, "refusing to overwrite `{}`", path.display()),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<MalformedIdentifier> for ExportError {
    fn from(value: MalformedIdentifier) -> Self {
        Self::Malformed(value)
    }
}

impl From<CodecError> for ExportError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<RepoError> for ExportError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Writes stored records back out as interchange documents.
pub struct Exporter<R: EntityRepository> {
    repo: R,
    config: ExportConfig,
}

impl<R: EntityRepository> Exporter<R> {
    pub fn new(repo: R, config: ExportConfig) -> Self {
        Self { repo, config }
    }

    /// Encoded document bytes for `id` of `kind`.
    pub fn export_entity(&self, kind: EntityKind, id: &str) -> ExportResult<Vec<u8>> {
        let prime_id = registry::validate(kind, id.trim())?;
        self.export_id(&prime_id)
    }

    pub fn export_id(&self, id: &PrimeId) -> ExportResult<Vec<u8>> {
        match id.kind() {
            EntityKind::Bibliography => self.encode_stored(id, |store| store.find_source(id)),
            EntityKind::Species => self.encode_stored(id, |store| store.find_species(id)),
            EntityKind::Reaction => self.encode_stored(id, |store| store.find_reaction(id)),
            EntityKind::KineticsModel => self.encode_stored(id, |store| store.find_kin_model(id)),
        }
    }

    /// Exports `id` to `<dir>/<id>.xml` and returns the written path.
    pub fn write_entity(&self, kind: EntityKind, id: &str, dir: &Path) -> ExportResult<PathBuf> {
        let prime_id = registry::validate(kind, id.trim())?;
        self.write_id(&prime_id, dir)
    }

    pub fn write_id(&self, id: &PrimeId, dir: &Path) -> ExportResult<PathBuf> {
        let bytes = self.export_id(id)?;
        let path = dir.join(format!("{id}.xml"));
        if !self.config.overwrite && path.exists() {
            return Err(ExportError::Exists(path));
        }
        std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        replace_file(dir, &path, &bytes)?;
        debug!(
            "event=export_document module=exporter status=ok prime_id={} path={}",
            id,
            path.display()
        );
        Ok(path)
    }

    /// Writes each of `ids`; failures are recorded and do not stop the run.
    pub fn export_batch<I, S>(&self, kind: EntityKind, ids: I, dir: &Path) -> ExportReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = ExportReport::new();
        for id in ids {
            let id = id.as_ref();
            match self.write_entity(kind, id, dir) {
                Ok(path) => report.written.push(path),
                Err(err) => {
                    let mut failure = FailureRecord::from(&err);
                    failure.kind = Some(kind);
                    failure.prime_id = Some(id.trim().to_string());
                    report.failures.push(failure);
                }
            }
        }
        info!(
            "event=export_batch module=exporter status={} run_id={} kind={} written={} failed={}",
            if report.failures.is_empty() { "ok" } else { "partial" },
            report.run_id,
            kind,
            report.written.len(),
            report.failures.len()
        );
        report
    }

    /// Writes every stored record of `kind`.
    pub fn export_all(&self, kind: EntityKind, dir: &Path) -> ExportResult<ExportReport> {
        let ids = self
            .repo
            .with_reader(|store| store.list_prime_ids(kind))?;
        Ok(self.export_batch(kind, ids.iter().map(PrimeId::to_string), dir))
    }

    fn encode_stored<D, F>(&self, id: &PrimeId, find: F) -> ExportResult<Vec<u8>>
    where
        D: PrimeDocument,
        F: FnOnce(&dyn EntityStore) -> RepoResult<Option<D>>,
    {
        let record = self
            .repo
            .with_reader(find)?
            .ok_or(ExportError::NotFound(*id))?;
        Ok(codec::encode_to_bytes(&record)?)
    }
}

fn replace_file(dir: &Path, path: &Path, bytes: &[u8]) -> ExportResult<()> {
    let io_error = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(io_error)?;
    staged.write_all(bytes).map_err(io_error)?;
    staged.as_file().sync_all().map_err(io_error)?;
    staged.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}
