//! Batch reports and the parallel import driver.
//!
//! # Responsibility
//! - Classify documents by root element and order them into dependency
//!   phases: bibliography, species, reaction, kinetics model.
//! - Fan each phase out over scoped worker threads, one SQLite connection
//!   per worker.
//! - Collect one `FailureRecord` per failed or skipped document.
//!
//! # Invariants
//! - A phase starts only after every document of the previous phase has
//!   committed or failed.
//! - Worker threads share no mutable state besides the work queue and the
//!   cancel flag.

use crate::codec::{self, xml, CodecError, Element};
use crate::config::SyncConfig;
use crate::db::{open_db_with, DbError};
use crate::logging::single_line;
use crate::model::ids::EntityKind;
use crate::registry::RegistryError;
use crate::repo::entity_repo::{RepoError, SqliteEntityRepository};
use crate::service::exporter::ExportError;
use crate::service::importer::{EntitySummary, ImportError, Importer};
use log::{info, warn};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const MAX_FAILURE_MESSAGE_CHARS: usize = 400;

/// Failure classification shared by import and export reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    MalformedDocument,
    SchemaViolation,
    MalformedIdentifier,
    NotFound,
    RepositoryConflict,
    Storage,
    Io,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedDocument => "MalformedDocument",
            Self::SchemaViolation => "SchemaViolation",
            Self::MalformedIdentifier => "MalformedIdentifier",
            Self::NotFound => "NotFound",
            Self::RepositoryConflict => "RepositoryConflict",
            Self::Storage => "Storage",
            Self::Io => "Io",
            Self::Cancelled => "Cancelled",
        }
    }

    pub(crate) fn from_codec(err: &CodecError) -> Self {
        match err {
            CodecError::MalformedDocument { .. } => Self::MalformedDocument,
            CodecError::SchemaViolation { .. } => Self::SchemaViolation,
            CodecError::MalformedIdentifier(_) => Self::MalformedIdentifier,
            CodecError::Write(_) => Self::Io,
        }
    }

    pub(crate) fn from_repo(err: &RepoError) -> Self {
        match err {
            RepoError::Validation(_) => Self::SchemaViolation,
            RepoError::NotFound(_) => Self::NotFound,
            RepoError::Conflict(_) => Self::RepositoryConflict,
            RepoError::Registry(RegistryError::Malformed(_)) => Self::MalformedIdentifier,
            RepoError::Db(_)
            | RepoError::Integrity(_)
            | RepoError::TransactionRequired
            | RepoError::InvalidData(_)
            | RepoError::Registry(_) => Self::Storage,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed or skipped document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub path: Option<PathBuf>,
    pub kind: Option<EntityKind>,
    /// Raw `primeID` text; kept even when it is malformed.
    pub prime_id: Option<String>,
    pub error_kind: ErrorKind,
    pub message: String,
}

impl FailureRecord {
    pub fn new(error_kind: ErrorKind, message: impl AsRef<str>) -> Self {
        Self {
            path: None,
            kind: None,
            prime_id: None,
            error_kind,
            message: single_line(message.as_ref(), MAX_FAILURE_MESSAGE_CHARS),
        }
    }

    pub fn with_path(mut self, path: Option<&Path>) -> Self {
        self.path = path.map(Path::to_path_buf);
        self
    }
}

impl From<&ImportError> for FailureRecord {
    fn from(value: &ImportError) -> Self {
        Self::new(value.kind(), value.to_string())
    }
}

impl From<&ExportError> for FailureRecord {
    fn from(value: &ExportError) -> Self {
        Self::new(value.kind(), value.to_string())
    }
}

/// Result of an import run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub succeeded: Vec<EntitySummary>,
    pub failures: Vec<FailureRecord>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of an export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub run_id: Uuid,
    pub written: Vec<PathBuf>,
    pub failures: Vec<FailureRecord>,
}

impl ExportReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            written: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl Default for ExportReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Raw input to a batch: in-memory bytes or a file still to be read.
#[derive(Debug, Clone)]
pub enum SourceDocument {
    Bytes {
        path: Option<PathBuf>,
        bytes: Vec<u8>,
    },
    File(PathBuf),
}

impl SourceDocument {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            path: None,
            bytes: bytes.into(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Bytes { path, .. } => path.as_deref(),
            Self::File(path) => Some(path),
        }
    }

    /// Reads (when needed) and parses the document.
    pub fn prepare(self) -> Result<PreparedDocument, FailureRecord> {
        let (path, bytes) = match self {
            Self::Bytes { path, bytes } => (path, bytes),
            Self::File(path) => match std::fs::read(&path) {
                Ok(bytes) => (Some(path), bytes),
                Err(source) => {
                    let err = ImportError::Io { path: path.clone(), source };
                    return Err(FailureRecord::from(&err).with_path(Some(&path)));
                }
            },
        };
        match xml::parse(&bytes) {
            Ok(root) => Ok(PreparedDocument::new(path, root)),
            Err(err) => {
                let err = ImportError::from(err);
                Err(FailureRecord::from(&err).with_path(path.as_deref()))
            }
        }
    }
}

/// Parsed document with its root classified.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub path: Option<PathBuf>,
    pub kind: Option<EntityKind>,
    pub root: Element,
}

impl PreparedDocument {
    pub fn new(path: Option<PathBuf>, root: Element) -> Self {
        let kind = codec::detect_kind(&root);
        Self { path, kind, root }
    }

    pub fn raw_prime_id(&self) -> Option<&str> {
        self.root.attr("primeID").map(str::trim)
    }

    /// Failure record carrying this document's identity.
    pub fn failure(&self, err: ImportError) -> FailureRecord {
        let mut record = FailureRecord::from(&err).with_path(self.path.as_deref());
        record.kind = self.kind;
        record.prime_id = self.raw_prime_id().map(str::to_string);
        record
    }

    pub fn cancelled(&self) -> FailureRecord {
        let mut record =
            FailureRecord::new(ErrorKind::Cancelled, "batch cancelled before import")
                .with_path(self.path.as_deref());
        record.kind = self.kind;
        record.prime_id = self.raw_prime_id().map(str::to_string);
        record
    }
}

/// Groups prepared documents into dependency-ordered phases.
///
/// Documents whose root is not a supported kind become failures.
pub fn plan_phases<I>(documents: I) -> (Vec<(EntityKind, Vec<PreparedDocument>)>, Vec<FailureRecord>)
where
    I: IntoIterator<Item = Result<PreparedDocument, FailureRecord>>,
{
    let mut phases: Vec<(EntityKind, Vec<PreparedDocument>)> = EntityKind::ALL
        .into_iter()
        .map(|kind| (kind, Vec::new()))
        .collect();
    let mut failures = Vec::new();

    for document in documents {
        match document {
            Ok(document) => match document.kind {
                Some(kind) => {
                    if let Some((_, bucket)) = phases.iter_mut().find(|(phase, _)| *phase == kind) {
                        bucket.push(document);
                    }
                }
                None => {
                    let err = CodecError::violation(
                        "root",
                        format!("unsupported root element <{}>", document.root.name),
                    );
                    failures.push(document.failure(err.into()));
                }
            },
            Err(failure) => failures.push(failure),
        }
    }

    phases.retain(|(_, bucket)| !bucket.is_empty());
    (phases, failures)
}

/// Imports `paths` into the database at `db_path` using a worker pool.
///
/// # Errors
/// - Returns `DbError` only when the database cannot be opened or migrated
///   up front. Per-document failures land in the report.
pub fn import_paths_parallel(
    db_path: &Path,
    paths: Vec<PathBuf>,
    config: &SyncConfig,
    cancel: &CancelFlag,
) -> Result<BatchReport, DbError> {
    // Migrate once before workers race to open the file.
    drop(open_db_with(db_path, &config.store)?);

    let workers = config.worker_count();
    let mut report = BatchReport::new();
    info!(
        "event=batch_start module=batch status=ok run_id={} documents={} workers={}",
        report.run_id,
        paths.len(),
        workers
    );

    let prepared = run_pool(
        paths.into_iter().map(SourceDocument::File).collect(),
        workers,
        || (),
        |_, document: SourceDocument| document.prepare(),
    );
    let (phases, failures) = plan_phases(prepared);
    report.failures.extend(failures);

    for (kind, documents) in phases {
        let outcomes = run_pool(
            documents,
            workers,
            || open_db_with(db_path, &config.store),
            |conn, document: PreparedDocument| {
                if cancel.is_cancelled() {
                    return Err(document.cancelled());
                }
                let conn = match conn {
                    Ok(conn) => conn,
                    Err(err) => {
                        let record = FailureRecord::new(ErrorKind::Storage, err.to_string());
                        let mut record = record.with_path(document.path.as_deref());
                        record.kind = document.kind;
                        record.prime_id = document.raw_prime_id().map(str::to_string);
                        return Err(record);
                    }
                };
                Importer::new(SqliteEntityRepository::new(conn), config.import.clone())
                    .import_prepared(&document)
            },
        );

        let mut failed = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(summary) => report.succeeded.push(summary),
                Err(failure) => {
                    failed += 1;
                    report.failures.push(failure);
                }
            }
        }
        info!(
            "event=batch_phase module=batch status={} run_id={} kind={} failed={}",
            if failed == 0 { "ok" } else { "partial" },
            report.run_id,
            kind,
            failed
        );
    }

    if cancel.is_cancelled() {
        warn!(
            "event=batch_cancelled module=batch status=cancelled run_id={}",
            report.run_id
        );
    }
    info!(
        "event=batch_done module=batch status={} run_id={} succeeded={} failed={}",
        if report.is_clean() { "ok" } else { "partial" },
        report.run_id,
        report.succeeded.len(),
        report.failures.len()
    );
    Ok(report)
}

/// Runs `work` over `items` on up to `workers` scoped threads.
///
/// Each thread builds its own state with `init`. Results keep input order.
fn run_pool<T, S, R, I, W>(items: Vec<T>, workers: usize, init: I, work: W) -> Vec<R>
where
    T: Send,
    R: Send,
    I: Fn() -> S + Sync,
    W: Fn(&mut S, T) -> R + Sync,
{
    let total = items.len();
    let workers = workers.clamp(1, total.max(1));
    let queue = Mutex::new(items.into_iter().enumerate());

    let mut indexed: Vec<(usize, R)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut state = init();
                    let mut done = Vec::new();
                    loop {
                        let next = match queue.lock() {
                            Ok(mut queue) => queue.next(),
                            Err(poisoned) => poisoned.into_inner().next(),
                        };
                        let Some((index, item)) = next else {
                            break;
                        };
                        done.push((index, work(&mut state, item)));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(done) => done,
                Err(payload) => std::panic::resume_unwind(payload),
            })
            .collect()
    });

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
}
