//! Stat-based staleness cache.
//!
//! One JSON file per installation root records, for every scanned target,
//! the `(mtime_ns, size)` it had when last scanned and what the scan found.
//! A later run skips any file whose stat still matches. Content is never
//! hashed, so edits that preserve both mtime and size go unnoticed.
//!
//! The whole file is discarded when its format version or logic signature
//! differs from the current constants. Individual malformed entries are
//! dropped without affecting the others.

use crate::error::PatchError;
use crate::fsutil::{atomic_write, relative_posix, FileStamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CACHE_FILENAME: &str = ".cgp-patch-cache.json";
pub const CACHE_VERSION: u64 = 1;

/// Bump whenever patch semantics change so stale caches are ignored.
pub const CACHE_SIGNATURE: &str = "cgp_v2_autorun+autorun_workbench+models";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    AlreadyPatched,
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub mtime_ns: i64,
    pub size: u64,
    pub status: CacheStatus,
}

impl CacheEntry {
    pub fn new(status: CacheStatus, stamp: FileStamp) -> Self {
        Self {
            mtime_ns: stamp.mtime_ns,
            size: stamp.size,
            status,
        }
    }

    /// True iff the file still has the recorded mtime and size.
    pub fn matches(&self, stamp: FileStamp) -> bool {
        self.mtime_ns == stamp.mtime_ns && self.size == stamp.size
    }
}

/// Relative POSIX path → entry.
pub type CacheMap = BTreeMap<String, CacheEntry>;

#[derive(Serialize)]
struct CacheFile<'a> {
    version: u64,
    signature: &'a str,
    files: &'a CacheMap,
}

pub fn cache_path(root: &Path) -> PathBuf {
    root.join(CACHE_FILENAME)
}

/// Cache key for `path`: relative to `root` with forward slashes, or the
/// full path if it lies outside `root`.
pub fn cache_key(path: &Path, root: &Path) -> String {
    relative_posix(path, root).unwrap_or_else(|| path.to_string_lossy().replace('\\', "/"))
}

/// Load the cache for an installation.
///
/// Returns `None` if the file is missing, unparseable, or was written by a
/// different format version or patch logic.
pub fn load_cache(root: &Path) -> Option<CacheMap> {
    let path = cache_path(root);
    let raw = fs::read(&path).ok()?;
    let doc: Value = match serde_json::from_slice(&raw) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("ignoring unparseable cache {}: {e}", path.display());
            return None;
        }
    };

    if doc.get("version").and_then(Value::as_u64) != Some(CACHE_VERSION) {
        tracing::debug!("ignoring cache {} with foreign version", path.display());
        return None;
    }
    if doc.get("signature").and_then(Value::as_str) != Some(CACHE_SIGNATURE) {
        tracing::debug!("ignoring cache {} with stale signature", path.display());
        return None;
    }

    let files = doc.get("files")?.as_object()?;
    let entries = files
        .iter()
        .filter_map(|(key, value)| parse_entry(value).map(|entry| (key.clone(), entry)))
        .collect();
    Some(entries)
}

fn parse_entry(value: &Value) -> Option<CacheEntry> {
    let obj = value.as_object()?;
    let mtime_ns = coerce_int(obj.get("mtime_ns")?)?;
    let size = u64::try_from(coerce_int(obj.get("size")?)?).ok()?;
    let status = CacheStatus::deserialize(obj.get("status")?).ok()?;
    Some(CacheEntry {
        mtime_ns,
        size,
        status,
    })
}

/// Integers are taken as-is, floats are truncated, everything else
/// (including booleans) is rejected.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

/// Persist the cache atomically.
pub fn save_cache(root: &Path, files: &CacheMap) -> Result<(), PatchError> {
    let path = cache_path(root);
    let payload = CacheFile {
        version: CACHE_VERSION,
        signature: CACHE_SIGNATURE,
        files,
    };
    let data = serde_json::to_vec_pretty(&payload).map_err(|source| PatchError::Json {
        path: path.clone(),
        source,
    })?;
    atomic_write(&path, &data).map_err(|e| PatchError::io(&path, "write", e))
}

/// Delete the cache file. Missing files are not an error.
pub fn invalidate_cache(root: &Path) -> Result<(), PatchError> {
    let path = cache_path(root);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PatchError::io(path, "remove", e)),
    }
}
