//! Mirror directory discovery.
//!
//! A PrIMe mirror keeps one catalog per kind at
//! `depository/<kind dir>/catalog/*.xml`. Version-control and bulk data
//! directories are pruned during the walk.

use primesync_core::EntityKind;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const SKIPPED_DIRS: &[&str] = &[".git", "data", "_attic"];

/// Depository directory name holding catalogs of `kind`.
pub fn depository_dir(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Bibliography => "bibliography",
        EntityKind::Species => "species",
        EntityKind::Reaction => "reactions",
        EntityKind::KineticsModel => "models",
    }
}

/// Catalog documents under `root`, sorted by path.
pub fn discover_catalog_files(root: &Path) -> walkdir::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry));
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_catalog_document(entry.path()) {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn is_catalog_document(path: &Path) -> bool {
    if path.extension().and_then(|ext| ext.to_str()) != Some("xml") {
        return false;
    }
    let mut parents = path.ancestors().skip(1).filter_map(|dir| dir.file_name()?.to_str());
    let (Some(catalog), Some(kind_dir), Some(depository)) =
        (parents.next(), parents.next(), parents.next())
    else {
        return false;
    };
    catalog == "catalog"
        && depository == "depository"
        && EntityKind::ALL
            .into_iter()
            .any(|kind| depository_dir(kind) == kind_dir)
}
