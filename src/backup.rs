//! Sidecar backups (`<file>.cgp.bak`).
//!
//! A backup is written once, before the first mutation, and never
//! overwritten afterwards: it always holds the pristine content.

use crate::error::PatchError;
use crate::fsutil::{atomic_write, permissions_of, replace_file};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const BACKUP_SUFFIX: &str = ".cgp.bak";

pub fn backup_path(original: &Path) -> PathBuf {
    let mut name = original
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    original.with_file_name(name)
}

/// Only a regular file counts as a backup.
pub fn has_backup(original: &Path) -> bool {
    backup_path(original).is_file()
}

/// Back up `original` unless a backup already exists.
///
/// Returns the backup path in both cases. Permission bits are copied on a
/// best-effort basis. Fails if something other than a regular file occupies
/// the backup path.
pub fn create_backup(original: &Path) -> Result<PathBuf, PatchError> {
    let bak = backup_path(original);
    if bak.is_file() {
        return Ok(bak);
    }
    if bak.symlink_metadata().is_ok() {
        return Err(PatchError::Backup {
            path: original.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is not a regular file", bak.display()),
            ),
        });
    }

    let content = fs::read(original).map_err(|source| PatchError::Backup {
        path: original.to_path_buf(),
        source,
    })?;
    atomic_write(&bak, &content).map_err(|source| PatchError::Backup {
        path: original.to_path_buf(),
        source,
    })?;

    if let Some(perms) = permissions_of(original) {
        if let Err(e) = fs::set_permissions(&bak, perms) {
            tracing::debug!("could not copy permissions to {}: {e}", bak.display());
        }
    }
    tracing::debug!("created backup {}", bak.display());
    Ok(bak)
}

/// Overwrite `original` with its backup, restoring the backup's permissions.
///
/// The backup itself is kept.
pub fn restore_backup(original: &Path) -> Result<(), PatchError> {
    let bak = backup_path(original);
    if !bak.is_file() {
        return Err(PatchError::MissingBackup {
            path: original.to_path_buf(),
        });
    }
    let content = fs::read(&bak).map_err(|e| PatchError::io(original, "restore", e))?;
    replace_file(original, &content, permissions_of(&bak)).map_err(|err| match err {
        PatchError::Io { source, .. } => PatchError::io(original, "restore", source),
        other => other,
    })?;
    tracing::info!("restored {}", original.display());
    Ok(())
}

/// Delete the backup. Returns `false` if there was none.
pub fn remove_backup(original: &Path) -> Result<bool, PatchError> {
    let bak = backup_path(original);
    if !bak.is_file() {
        return Ok(false);
    }
    fs::remove_file(&bak).map_err(|e| PatchError::io(&bak, "remove backup", e))?;
    Ok(true)
}
