//! Forward patch flow.

use super::sync::{sync_checksums, sync_loader_hashes, HashPair};
use crate::backup::{create_backup, has_backup, restore_backup};
use crate::cache::{
    cache_key, invalidate_cache, load_cache, save_cache, CacheEntry, CacheMap, CacheStatus,
};
use crate::codesign::Resigner;
use crate::config::PatchOptions;
use crate::discovery::Installation;
use crate::error::PatchError;
use crate::fsutil::{permissions_of, replace_file, sha256_hex, FileStamp};
use crate::patches::PatchKind;
use crate::report::{PatchReport, ReportError};
use crate::targets::{
    auxiliary_paths, loader_path, manifest_path, target_files, TargetFile, CHECKSUM_SUBTREE,
};
use std::fs;
use std::path::PathBuf;

/// What happened to one target file.
#[derive(Debug)]
enum FileOutcome {
    /// Skipped on a cache hit.
    Cached(CacheStatus),
    /// Read and patched in memory, but nothing changed.
    Unchanged(CacheStatus),
    /// Would be written (dry run).
    WouldPatch,
    /// Written to disk.
    Written(HashPair),
}

/// Per-installation cache state. `previous` is `None` when the cache must
/// not be consulted; `next` is `None` when it must not be persisted.
struct CacheState {
    previous: Option<CacheMap>,
    next: Option<CacheMap>,
}

impl CacheState {
    fn for_run(inst: &Installation, options: &PatchOptions) -> Self {
        if !options.uses_cache() {
            return Self {
                previous: None,
                next: None,
            };
        }
        let previous = if options.force {
            None
        } else {
            Some(load_cache(&inst.root).unwrap_or_default())
        };
        Self {
            previous,
            next: Some(CacheMap::new()),
        }
    }

    fn record(&mut self, key: String, entry: CacheEntry) {
        if let Some(next) = self.next.as_mut() {
            next.insert(key, entry);
        }
    }
}

/// Patch every target file of every installation.
///
/// Failures never abort the run: they are collected into the report, and
/// an installation that fails after writing anything is rolled back.
pub fn patch(
    installations: &[Installation],
    options: &PatchOptions,
    resigner: &dyn Resigner,
) -> PatchReport {
    let mut report = PatchReport::default();
    for inst in installations {
        patch_installation(inst, options, resigner, &mut report);
    }
    report
}

fn patch_installation(
    inst: &Installation,
    options: &PatchOptions,
    resigner: &dyn Resigner,
    report: &mut PatchReport,
) {
    tracing::debug!("patching {} installation at {}", inst.kind, inst.root.display());
    let errors_before = report.errors.len();
    let patched_before = report.patched.len();
    let mut cache = CacheState::for_run(inst, options);
    let mut hash_pairs = Vec::new();

    for target in target_files(inst) {
        let patches = options.select(&target.patches);
        if patches.is_empty() {
            continue;
        }
        match patch_target(inst, &target, &patches, options.dry_run, &mut cache, report) {
            Ok(FileOutcome::Cached(status)) => {
                report.cached += 1;
                count_status(report, status);
            }
            Ok(FileOutcome::Unchanged(status)) => count_status(report, status),
            Ok(FileOutcome::WouldPatch) => report.patched.push(target.path),
            Ok(FileOutcome::Written(pair)) => {
                report.patched.push(target.path);
                hash_pairs.push(pair);
            }
            Err(err) => report.record(err, &target.path),
        }
    }

    if !options.dry_run {
        sync_installation(inst, &hash_pairs, patched_before, report);

        if report.errors.len() > errors_before && report.patched.len() > patched_before {
            rollback_installation(inst, patched_before, report);
        }
    }

    if let Some(next) = cache.next.as_ref() {
        if report.errors.len() == errors_before {
            if let Err(e) = save_cache(&inst.root, next) {
                tracing::debug!("cache not saved for {}: {e}", inst.root.display());
            }
        }
    }

    if !options.dry_run && report.patched.len() > patched_before && resigner.needs_resign(inst) {
        report.codesign.push(resigner.resign(inst));
    }
}

fn count_status(report: &mut PatchReport, status: CacheStatus) {
    match status {
        CacheStatus::AlreadyPatched => report.already_patched += 1,
        CacheStatus::NotApplicable => report.not_applicable += 1,
    }
}

fn patch_target(
    inst: &Installation,
    target: &TargetFile,
    patches: &[PatchKind],
    dry_run: bool,
    cache: &mut CacheState,
    report: &mut PatchReport,
) -> Result<FileOutcome, PatchError> {
    let path = &target.path;
    let key = cache_key(path, &inst.root);

    let mut stamp = None;
    if let Some(previous) = cache.previous.as_ref() {
        let current = FileStamp::of(path)?;
        if let Some(entry) = previous.get(&key).filter(|e| e.matches(current)) {
            tracing::debug!("cache hit for {}", path.display());
            let entry = *entry;
            cache.record(key, entry);
            return Ok(FileOutcome::Cached(entry.status));
        }
        stamp = Some(current);
    }

    report.scanned += 1;
    let original = fs::read(path).map_err(|e| PatchError::io(path, "read", e))?;
    let mut content = String::from_utf8_lossy(&original).into_owned();

    let mut any_applied = false;
    let mut any_already = false;
    for kind in patches {
        let (next, outcome) = kind.patch().apply(&content);
        for note in &outcome.notes {
            tracing::debug!("{kind} on {}: {note}", path.display());
        }
        any_applied |= outcome.is_applied();
        any_already |= outcome.is_already_patched();
        content = next;
    }

    if !any_applied {
        let status = if any_already {
            CacheStatus::AlreadyPatched
        } else {
            CacheStatus::NotApplicable
        };
        if let Some(stamp) = stamp.or_else(|| FileStamp::of(path).ok()) {
            cache.record(key, CacheEntry::new(status, stamp));
        }
        return Ok(FileOutcome::Unchanged(status));
    }

    if dry_run {
        tracing::info!("would patch {}", path.display());
        return Ok(FileOutcome::WouldPatch);
    }

    let old = sha256_hex(&original);
    let perms = permissions_of(path);
    create_backup(path)?;

    let new_bytes = content.into_bytes();
    replace_file(path, &new_bytes, perms)?;
    tracing::info!("patched {}", path.display());

    match FileStamp::of(path) {
        Ok(after) => cache.record(key, CacheEntry::new(CacheStatus::AlreadyPatched, after)),
        Err(e) => tracing::debug!("no cache entry for {}: {e}", path.display()),
    }

    Ok(FileOutcome::Written(HashPair {
        old,
        new: sha256_hex(&new_bytes),
    }))
}

/// Bring the loader hashes and the manifest checksums in line with the
/// files written for this installation.
fn sync_installation(
    inst: &Installation,
    hash_pairs: &[HashPair],
    patched_before: usize,
    report: &mut PatchReport,
) {
    let loader = loader_path(&inst.root);
    let loader_modified = match sync_loader_hashes(&inst.root, hash_pairs) {
        Ok(modified) => modified,
        Err(err) => {
            report.record(err, &loader);
            false
        }
    };

    let subtree = inst.root.join(CHECKSUM_SUBTREE);
    let mut modified: Vec<PathBuf> = report.patched[patched_before..]
        .iter()
        .filter(|p| p.starts_with(&subtree))
        .cloned()
        .collect();
    if loader_modified && !modified.contains(&loader) {
        modified.push(loader);
    }
    if modified.is_empty() {
        return;
    }

    if let Err(err) = sync_checksums(&inst.root, &modified) {
        report.record(err, &manifest_path(&inst.root));
    }
}

/// Restore everything this installation run wrote and forget its cache.
fn rollback_installation(inst: &Installation, patched_before: usize, report: &mut PatchReport) {
    tracing::info!("rolling back {}", inst.root.display());

    let mut paths: Vec<PathBuf> = report.patched[patched_before..].to_vec();
    for aux in auxiliary_paths(&inst.root) {
        if !paths.contains(&aux) {
            paths.push(aux);
        }
    }

    for path in &paths {
        if !has_backup(path) {
            continue;
        }
        if let Err(err) = restore_backup(path) {
            let entry = ReportError::from_error(&err, path);
            tracing::warn!("rollback of {} failed: {}", path.display(), entry.message);
            report
                .errors
                .push(ReportError::new(entry.path, format!("rollback {}", entry.message)));
        }
    }

    report.patched.truncate(patched_before);

    if let Err(e) = invalidate_cache(&inst.root) {
        tracing::debug!("cache not removed for {}: {e}", inst.root.display());
    }
}
