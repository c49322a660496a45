//! Reverse flow: restore target and auxiliary files from their backups.

use crate::backup::{has_backup, remove_backup, restore_backup};
use crate::cache::invalidate_cache;
use crate::codesign::Resigner;
use crate::discovery::Installation;
use crate::report::UnpatchReport;
use crate::targets::{auxiliary_paths, target_files};
use std::path::Path;

/// Restore every backed-up file of every installation.
///
/// Successfully restored files lose their backup, since the user asked for
/// a terminal reversal. A target without a backup is reported, not failed.
pub fn unpatch(
    installations: &[Installation],
    dry_run: bool,
    resigner: &dyn Resigner,
) -> UnpatchReport {
    let mut report = UnpatchReport::default();
    for inst in installations {
        let restored_before = report.restored.len();

        for target in target_files(inst) {
            if !has_backup(&target.path) {
                report.no_backup.push(target.path);
                continue;
            }
            if restore_one(&target.path, dry_run, &mut report) && !dry_run {
                if let Err(e) = invalidate_cache(&inst.root) {
                    tracing::debug!("cache not removed for {}: {e}", inst.root.display());
                }
            }
        }

        for aux in auxiliary_paths(&inst.root) {
            if has_backup(&aux) {
                restore_one(&aux, dry_run, &mut report);
            }
        }

        if !dry_run && report.restored.len() > restored_before && resigner.needs_resign(inst) {
            report.codesign.push(resigner.resign(inst));
        }
    }
    report
}

fn restore_one(path: &Path, dry_run: bool, report: &mut UnpatchReport) -> bool {
    if dry_run {
        tracing::info!("would restore {}", path.display());
        report.restored.push(path.to_path_buf());
        return true;
    }
    match restore_backup(path) {
        Ok(()) => {
            report.restored.push(path.to_path_buf());
            if let Err(e) = remove_backup(path) {
                tracing::debug!("backup of {} kept: {e}", path.display());
            }
            true
        }
        Err(err) => {
            report.record(err, path);
            false
        }
    }
}
