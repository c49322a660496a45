//! Read-only marker scan.

use crate::backup::has_backup;
use crate::discovery::Installation;
use crate::report::{FileStatus, StatusReport};
use crate::targets::target_files;
use std::collections::BTreeMap;
use std::fs;

/// Report, per target file, which patch markers are present.
///
/// Marker presence is checked regardless of applicability. A file that
/// cannot be read carries its error instead of marker states.
pub fn status(installations: &[Installation]) -> StatusReport {
    let mut report = StatusReport {
        installations: installations.to_vec(),
        files: Vec::new(),
    };

    for inst in installations {
        for target in target_files(inst) {
            let mut file = FileStatus {
                has_backup: has_backup(&target.path),
                label: target.label.to_string(),
                patch_names: target.patches.clone(),
                patched: BTreeMap::new(),
                path: target.path,
                error: None,
            };

            match fs::read(&file.path) {
                Ok(raw) => {
                    let content = String::from_utf8_lossy(&raw);
                    for kind in &file.patch_names {
                        file.patched
                            .insert(*kind, kind.patch().is_already_patched(&content));
                    }
                }
                Err(e) => file.error = Some(format!("read failed: {e}")),
            }
            report.files.push(file);
        }
    }
    report
}
