//! Reading and writing the pack files
//!
//! Both files are read whole, parsed, and replaced atomically. Any read or
//! parse failure is structural and aborts the operation before a write.

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::catalog::CatalogEntry;
use super::model::Manifest;
use crate::core::files::write_atomic;
use crate::core::{FileOperation, PackError, Result};

/// Default pack index location, relative to the pack root
pub const DEFAULT_INDEX_FILE: &str = "modrinth.index.json";

/// Default override catalog list location, relative to the pack root
pub const DEFAULT_CATALOG_FILE: &str = "curseforge_overrides.json";

pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| PackError::fs(path, FileOperation::Read, e))
}

pub fn parse_manifest(path: &Path, text: &str) -> Result<Manifest> {
    serde_json::from_str(text).map_err(|e| PackError::InvalidJson {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn parse_catalog(path: &Path, text: &str) -> Result<Vec<CatalogEntry>> {
    serde_json::from_str(text).map_err(|e| PackError::InvalidJson {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let text = read_text(path)?;
    let manifest = parse_manifest(path, &text)?;
    debug!("Loaded {} ({} files)", path.display(), manifest.files.len());
    Ok(manifest)
}

pub fn read_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let text = read_text(path)?;
    parse_catalog(path, &text)
}

fn render<T: Serialize>(path: &Path, value: &T) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value).map_err(|e| PackError::InvalidJson {
        path: path.to_path_buf(),
        source: e,
    })?;
    text.push('\n');
    Ok(text)
}

/// Serialized form of a manifest: known keys in canonical order, two-space indent
pub fn render_manifest(path: &Path, manifest: &Manifest) -> Result<String> {
    render(path, manifest)
}

/// Serialized form of a catalog list, each entry with alphabetical keys
pub fn render_catalog(path: &Path, entries: &[CatalogEntry]) -> Result<String> {
    let values: Vec<Value> = entries.iter().map(CatalogEntry::to_sorted_value).collect();
    render(path, &values)
}

pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let text = render_manifest(path, manifest)?;
    write_atomic(path, text.as_bytes())
}

/// Copy `path` to `<path>.<YYYYMMDD-HHMMSS>.bak` and return the backup location
pub fn backup_file(path: &Path) -> Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.bak", stamp));
    let backup = path.with_file_name(name);

    std::fs::copy(path, &backup).map_err(|e| PackError::fs(&backup, FileOperation::Copy, e))?;
    debug!("Backed up {} to {}", path.display(), backup.display());
    Ok(backup)
}
