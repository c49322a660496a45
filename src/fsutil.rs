//! Filesystem primitives shared by the cache, backup store and engine.

use crate::error::PatchError;
use filetime::FileTime;
use std::fs::{self, Metadata, Permissions};
use std::io::Write;
use std::path::Path;

/// Modification time (nanoseconds since the Unix epoch) and byte size of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub mtime_ns: i64,
    pub size: u64,
}

impl FileStamp {
    pub fn from_metadata(meta: &Metadata) -> Self {
        let mtime = FileTime::from_last_modification_time(meta);
        Self {
            mtime_ns: mtime
                .unix_seconds()
                .saturating_mul(1_000_000_000)
                .saturating_add(i64::from(mtime.nanoseconds())),
            size: meta.len(),
        }
    }

    pub fn of(path: &Path) -> Result<Self, PatchError> {
        let meta = fs::metadata(path).map_err(|e| PatchError::io(path, "stat", e))?;
        Ok(Self::from_metadata(&meta))
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// The temp file lives in the destination directory so the rename never
/// crosses filesystems. Readers see either the old or the new content.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no parent directory",
            ))
        }
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Atomically replace `path`, then put `permissions` back on it.
///
/// The temp file is created with restrictive permissions, so the original
/// mode has to be reapplied after the rename. Failing to do so is not an
/// error: the content is already in place.
pub fn replace_file(
    path: &Path,
    content: &[u8],
    permissions: Option<Permissions>,
) -> Result<(), PatchError> {
    atomic_write(path, content).map_err(|e| PatchError::io(path, "write", e))?;
    if let Some(perms) = permissions {
        if let Err(e) = fs::set_permissions(path, perms) {
            tracing::debug!("could not restore permissions on {}: {e}", path.display());
        }
    }
    Ok(())
}

/// Current permissions of `path`, if it can be stat'ed.
pub fn permissions_of(path: &Path) -> Option<Permissions> {
    fs::metadata(path).ok().map(|m| m.permissions())
}

/// `path` relative to `root`, with forward slashes.
///
/// Returns `None` when `path` is not under `root`.
pub fn relative_posix(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(bytes))
}
