//! File operation utilities
//!
//! Shared helpers for staging and replacing files so a crash never leaves a
//! half-written index or artifact behind.

use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::core::{FileOperation, PackError, Result};

/// Sibling path used while an artifact is being downloaded
pub fn create_temp_path(dest_path: &Path) -> PathBuf {
    let mut name = dest_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest_path.with_file_name(name)
}

/// Atomically rename a temporary file to its final destination
pub async fn atomic_rename(temp_path: &Path, dest_path: &Path) -> Result<()> {
    fs::rename(temp_path, dest_path)
        .await
        .map_err(|e| PackError::fs(dest_path, FileOperation::Move, e))?;
    debug!("Atomically renamed {} to {}", temp_path.display(), dest_path.display());
    Ok(())
}

/// Permissions a freshly written file should carry
///
/// An existing destination keeps its own mode. New files get the usual
/// world-readable mode instead of the owner-only mode temp files start with.
fn target_permissions(dest_path: &Path) -> Option<std::fs::Permissions> {
    match std::fs::metadata(dest_path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<std::fs::Permissions> {
    None
}

/// Replace `dest_path` with `contents` via a temp file in the same directory
///
/// The temp file is renamed over the destination only after it has been
/// fully written and synced; on error it is removed and the original stays intact.
/// The destination's permissions are carried over to the new file.
pub fn write_atomic(dest_path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match dest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| PackError::fs(dir, FileOperation::Create, e))?;
    temp.write_all(contents)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| PackError::fs(temp.path(), FileOperation::Write, e))?;
    if let Some(permissions) = target_permissions(dest_path) {
        temp.as_file()
            .set_permissions(permissions)
            .map_err(|e| PackError::fs(temp.path(), FileOperation::Write, e))?;
    }

    temp.persist(dest_path)
        .map_err(|e| PackError::fs(dest_path, FileOperation::Move, e.error))?;
    debug!("Wrote {} ({} bytes)", dest_path.display(), contents.len());
    Ok(())
}

/// Remove a file, treating "already gone" as success
pub async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PackError::fs(path, FileOperation::Delete, e)),
    }
}
