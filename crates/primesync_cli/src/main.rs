//! `primesync` command line entry point.
//!
//! # Responsibility
//! - Parse arguments and load optional TOML configuration.
//! - Drive mirror imports, catalog exports, and identifier allocation.
//! - Write one JSON line per failed document to the error file.

mod discover;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use primesync_core::{
    default_log_level, import_paths_parallel, init_logging, open_db_with, CancelFlag,
    EntityKind, Exporter, FailureRecord, IdentifierRegistry, SqliteEntityRepository,
    SqliteIdentifierRegistry, SyncConfig,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "primesync")]
#[command(version, about = "Sync PrIMe interchange XML with a SQLite kinetics store")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import every catalog document found under a mirror root
    Import {
        /// Mirror root containing `depository/`
        root: PathBuf,
        #[arg(long)]
        db: PathBuf,
        /// Worker threads (defaults to host parallelism)
        #[arg(short, long)]
        workers: Option<usize>,
        #[arg(long, default_value = "importerrors.jsonl")]
        errors: PathBuf,
    },
    /// Export stored records as `<primeID>.xml` files
    Export {
        #[arg(long)]
        db: PathBuf,
        /// bibliography|species|reaction|kinetics_model
        #[arg(short, long)]
        kind: EntityKind,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value = "exporterrors.jsonl")]
        errors: PathBuf,
        /// Identifiers to export; all stored ids of the kind when empty
        ids: Vec<String>,
    },
    /// Allocate and print the next unused identifier of a kind
    NextId {
        #[arg(long)]
        db: PathBuf,
        #[arg(short, long)]
        kind: EntityKind,
    },
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(clean) => std::process::exit(if clean { 0 } else { 2 }),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

/// Returns `false` when some documents failed.
fn run(cli: Cli) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("loading config `{}`", path.display()))?,
        None => SyncConfig::default(),
    };

    if let Some(dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let dir = dir
            .to_str()
            .context("log directory must be valid UTF-8")?;
        init_logging(level, dir)?;
    }

    match cli.command {
        Command::Import {
            root,
            db,
            workers,
            errors,
        } => {
            if workers.is_some() {
                config.workers = workers;
            }
            import(&root, &db, &config, &errors)
        }
        Command::Export {
            db,
            kind,
            out,
            errors,
            ids,
        } => export(&db, kind, &out, &ids, &config, &errors),
        Command::NextId { db, kind } => {
            let conn = open_db_with(&db, &config.store)
                .with_context(|| format!("opening database `{}`", db.display()))?;
            let id = SqliteIdentifierRegistry::new(&conn).next(kind)?;
            println!("{id}");
            Ok(true)
        }
    }
}

fn import(root: &Path, db: &Path, config: &SyncConfig, errors: &Path) -> Result<bool> {
    if !root.is_dir() {
        bail!("mirror root `{}` is not a directory", root.display());
    }
    let paths = discover::discover_catalog_files(root)
        .with_context(|| format!("walking `{}`", root.display()))?;
    info!(
        "event=discover module=cli status=ok root={} documents={}",
        root.display(),
        paths.len()
    );

    let report = import_paths_parallel(db, paths, config, &CancelFlag::new())
        .with_context(|| format!("opening database `{}`", db.display()))?;
    write_failures(errors, &report.failures)?;

    println!(
        "run {}: imported {} documents, {} failed",
        report.run_id,
        report.succeeded.len(),
        report.failures.len()
    );
    if !report.failures.is_empty() {
        println!("failures written to {}", errors.display());
    }
    Ok(report.is_clean())
}

fn export(
    db: &Path,
    kind: EntityKind,
    out: &Path,
    ids: &[String],
    config: &SyncConfig,
    errors: &Path,
) -> Result<bool> {
    let conn = open_db_with(db, &config.store)
        .with_context(|| format!("opening database `{}`", db.display()))?;
    let exporter = Exporter::new(SqliteEntityRepository::new(&conn), config.export.clone());
    let report = if ids.is_empty() {
        exporter.export_all(kind, out)?
    } else {
        exporter.export_batch(kind, ids, out)
    };
    write_failures(errors, &report.failures)?;

    println!(
        "run {}: wrote {} {kind} documents to {}, {} failed",
        report.run_id,
        report.written.len(),
        out.display(),
        report.failures.len()
    );
    Ok(report.failures.is_empty())
}

/// Truncates `path` and writes one JSON object per failure.
fn write_failures(path: &Path, failures: &[FailureRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating error file `{}`", path.display()))?;
    let mut writer = BufWriter::new(file);
    for failure in failures {
        serde_json::to_writer(&mut writer, failure)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
