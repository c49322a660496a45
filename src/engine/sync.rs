//! Keeping derived artifacts consistent with rewritten bundle files.
//!
//! Two artifacts embed digests of the files the engine rewrites:
//!
//! - the extension host loader carries hex SHA-256 literals of extension
//!   bundles and refuses to load a bundle whose hash it does not know;
//! - `product.json` carries a `checksums` table (unpadded base64 SHA-256,
//!   keyed relative to `out/`) that the desktop app verifies on startup.

use crate::backup::create_backup;
use crate::error::PatchError;
use crate::fsutil::{permissions_of, relative_posix, replace_file};
use crate::targets::{loader_path, manifest_path, CHECKSUM_SUBTREE};
use aho_corasick::{AhoCorasick, MatchKind};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Hex SHA-256 of a target file before and after it was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPair {
    pub old: String,
    pub new: String,
}

/// Replace every old hash literal in the loader with its new hash.
///
/// Substitution is a single leftmost-first pass over the raw bytes, so a
/// new hash can never be rewritten again by a later pair. Returns `true`
/// only if the loader was backed up and rewritten; a loader that is
/// missing or references none of the old hashes is left untouched.
pub fn sync_loader_hashes(root: &Path, pairs: &[HashPair]) -> Result<bool, PatchError> {
    let loader = loader_path(root);
    if pairs.is_empty() || !loader.is_file() {
        return Ok(false);
    }

    let content = fs::read(&loader).map_err(|e| PatchError::io(&loader, "read", e))?;

    let patterns: Vec<&str> = pairs.iter().map(|p| p.old.as_str()).collect();
    let replacements: Vec<&str> = pairs.iter().map(|p| p.new.as_str()).collect();
    let matcher = AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostFirst)
        .build(&patterns)
        .map_err(|e| PatchError::io(&loader, "hash sync", std::io::Error::other(e)))?;

    if !matcher.is_match(&content) {
        tracing::debug!("loader {} references no rewritten file", loader.display());
        return Ok(false);
    }
    let updated = matcher.replace_all_bytes(&content, &replacements);
    if updated == content {
        return Ok(false);
    }

    let perms = permissions_of(&loader);
    create_backup(&loader)?;
    replace_file(&loader, &updated, perms)?;
    tracing::info!("updated extension hashes in {}", loader.display());
    Ok(true)
}

/// Unpadded standard base64 of the SHA-256 of `bytes`.
pub fn checksum_b64(bytes: &[u8]) -> String {
    STANDARD_NO_PAD.encode(Sha256::digest(bytes))
}

/// Refresh `product.json` checksums for `modified` files under `out/`.
///
/// A manifest without a non-empty `checksums` object is left alone, as is
/// any modified file that has no entry in it. Returns `true` if the
/// manifest was backed up and rewritten (compact, key order preserved).
pub fn sync_checksums(root: &Path, modified: &[PathBuf]) -> Result<bool, PatchError> {
    let manifest = manifest_path(root);
    if modified.is_empty() || !manifest.is_file() {
        return Ok(false);
    }

    let raw = fs::read(&manifest).map_err(|e| PatchError::io(&manifest, "read", e))?;
    let mut doc: Value = serde_json::from_slice(&raw).map_err(|source| PatchError::Json {
        path: manifest.clone(),
        source,
    })?;

    let Some(checksums) = doc.get_mut("checksums").and_then(Value::as_object_mut) else {
        return Ok(false);
    };
    if checksums.is_empty() {
        return Ok(false);
    }

    let subtree = root.join(CHECKSUM_SUBTREE);
    let mut updated = false;
    for file in modified {
        let Some(rel) = relative_posix(file, &subtree) else {
            continue;
        };
        let Some(entry) = checksums.get_mut(&rel) else {
            continue;
        };
        let bytes = match fs::read(file) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("skipping checksum for {}: {e}", file.display());
                continue;
            }
        };
        let digest = checksum_b64(&bytes);
        if entry.as_str() != Some(digest.as_str()) {
            *entry = Value::String(digest);
            updated = true;
        }
    }

    if !updated {
        return Ok(false);
    }

    let data = serde_json::to_vec(&doc).map_err(|source| PatchError::Json {
        path: manifest.clone(),
        source,
    })?;
    let perms = permissions_of(&manifest);
    create_backup(&manifest)?;
    replace_file(&manifest, &data, perms)?;
    tracing::info!("updated checksums in {}", manifest.display());
    Ok(true)
}
