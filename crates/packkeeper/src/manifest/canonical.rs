//! Canonical form of the pack files
//!
//! Files are sorted by path, dependencies lead with the loader and game keys,
//! and the catalog list is sorted by id. Key order inside records comes from
//! the model's field order, so canonicalizing is sort-and-serialize.

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

use super::catalog::CatalogEntry;
use super::io;
use super::model::{Dependencies, JsonMap, Manifest};
use crate::core::Result;
use crate::core::files::write_atomic;

/// Put a manifest into canonical form
pub fn canonicalize(mut manifest: Manifest) -> Manifest {
    // Stable, so entries sharing a path keep their relative order.
    manifest.files.sort_by(|a, b| a.path.cmp(&b.path));
    for path in duplicate_paths(&manifest) {
        warn!("Path {} is listed more than once in the index", path);
    }
    manifest.dependencies = manifest
        .dependencies
        .map(|deps| deps.map(canonical_dependencies));
    manifest
}

/// Paths carried by more than one file entry, each reported once
pub fn duplicate_paths(manifest: &Manifest) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for entry in &manifest.files {
        let path = entry.path.as_str();
        if !seen.insert(path) && !duplicates.contains(&path) {
            duplicates.push(path);
        }
    }
    duplicates
}

fn canonical_dependencies(Dependencies(deps): Dependencies) -> Dependencies {
    let mut ordered = JsonMap::new();
    for key in Dependencies::LEADING_KEYS {
        if let Some(value) = deps.get(key) {
            ordered.insert(key.to_string(), value.clone());
        }
    }
    for (key, value) in deps {
        if !ordered.contains_key(&key) {
            ordered.insert(key, value);
        }
    }
    Dependencies(ordered)
}

/// Sort a catalog list by id; entry keys are alphabetized when rendered
pub fn canonicalize_catalog(mut entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    entries
}

/// What happened to one file during canonicalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalStatus {
    /// Already canonical, left untouched
    Unchanged,
    /// Rewritten in canonical form
    Rewritten,
    /// Not canonical, but running in check mode
    NeedsRewrite,
}

/// A file whose canonical text has been computed but not written yet
struct Pending<'a> {
    path: &'a Path,
    original: String,
    canonical: String,
}

impl Pending<'_> {
    fn is_canonical(&self) -> bool {
        self.original == self.canonical
    }

    fn apply(&self, check: bool) -> Result<CanonicalStatus> {
        if self.is_canonical() {
            debug!("{} is already canonical", self.path.display());
            return Ok(CanonicalStatus::Unchanged);
        }
        if check {
            return Ok(CanonicalStatus::NeedsRewrite);
        }
        write_atomic(self.path, self.canonical.as_bytes())?;
        info!("Canonicalized {}", self.path.display());
        Ok(CanonicalStatus::Rewritten)
    }
}

fn prepare_index(path: &Path) -> Result<Pending<'_>> {
    let original = io::read_text(path)?;
    let manifest = canonicalize(io::parse_manifest(path, &original)?);
    let canonical = io::render_manifest(path, &manifest)?;
    Ok(Pending {
        path,
        original,
        canonical,
    })
}

fn prepare_catalog(path: &Path) -> Result<Pending<'_>> {
    let original = io::read_text(path)?;
    let entries = canonicalize_catalog(io::parse_catalog(path, &original)?);
    let canonical = io::render_catalog(path, &entries)?;
    Ok(Pending {
        path,
        original,
        canonical,
    })
}

/// Outcome of canonicalizing the pack files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalReport {
    pub index: CanonicalStatus,
    pub catalog: Option<CanonicalStatus>,
}

impl CanonicalReport {
    /// True when some file is not canonical and was left as is
    pub fn needs_rewrite(&self) -> bool {
        self.index == CanonicalStatus::NeedsRewrite
            || self.catalog == Some(CanonicalStatus::NeedsRewrite)
    }
}

/// Canonicalize the index and, if given, the catalog list
///
/// Both files are parsed before either is written, so a malformed file
/// aborts the run without touching anything. With `check` set nothing is
/// written at all.
pub fn canonicalize_files(
    index_path: &Path,
    catalog_path: Option<&Path>,
    check: bool,
) -> Result<CanonicalReport> {
    let index = prepare_index(index_path)?;
    let catalog = catalog_path.map(prepare_catalog).transpose()?;

    Ok(CanonicalReport {
        index: index.apply(check)?,
        catalog: catalog.map(|c| c.apply(check)).transpose()?,
    })
}
