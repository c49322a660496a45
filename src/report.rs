//! Run reports and their human-readable summaries.

use crate::codesign::CodesignOutcome;
use crate::discovery::Installation;
use crate::error::PatchError;
use crate::patches::PatchKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// An error recorded against one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportError {
    pub path: PathBuf,
    pub message: String,
}

impl ReportError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Convert a library error; `fallback` is used when it names no path.
    pub fn from_error(err: &PatchError, fallback: &Path) -> Self {
        Self::new(err.path().unwrap_or(fallback), err.to_string())
    }
}

fn has_permission_error(errors: &[ReportError]) -> bool {
    errors.iter().any(|e| {
        let low = e.message.to_lowercase();
        low.contains("permission denied")
            || low.contains("os error 13")
            || low.contains("access is denied")
    })
}

fn write_permission_hint(f: &mut fmt::Formatter<'_>, command: &str) -> fmt::Result {
    writeln!(f)?;
    if cfg!(windows) {
        writeln!(f, "Fix: Run as Administrator")
    } else {
        writeln!(f, "Fix: Run with elevated permissions:")?;
        writeln!(f, "  sudo cgp {command}")
    }
}

fn write_codesign(f: &mut fmt::Formatter<'_>, outcomes: &[CodesignOutcome]) -> fmt::Result {
    for cs in outcomes {
        if cs.success {
            writeln!(f, "Codesign: {} (re-signed)", cs.app_path.display())?;
        } else if let Some(err) = &cs.error {
            writeln!(f, "Codesign FAILED: {err}")?;
            writeln!(
                f,
                "Fix: sudo codesign --force --deep --sign - {}",
                cs.app_path.display()
            )?;
        }
    }
    Ok(())
}

fn write_errors(f: &mut fmt::Formatter<'_>, errors: &[ReportError], command: &str) -> fmt::Result {
    if errors.is_empty() {
        return Ok(());
    }
    writeln!(f, "Errors: {}", errors.len())?;
    for e in errors {
        writeln!(f, "  {}: {}", e.path.display(), e.message)?;
    }
    if has_permission_error(errors) {
        write_permission_hint(f, command)?;
    }
    Ok(())
}

/// Result of a `patch` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Files read and run through their patches.
    pub scanned: usize,
    /// Files written (or that would be, in a dry run).
    pub patched: Vec<PathBuf>,
    pub already_patched: usize,
    pub not_applicable: usize,
    /// Files skipped because their cache entry still matched.
    pub cached: usize,
    pub errors: Vec<ReportError>,
    pub codesign: Vec<CodesignOutcome>,
}

impl PatchReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn record(&mut self, err: PatchError, fallback: &Path) {
        let entry = ReportError::from_error(&err, fallback);
        tracing::warn!("{}: {}", entry.path.display(), entry.message);
        self.errors.push(entry);
    }
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scanned: {}", self.scanned)?;
        writeln!(f, "Patched: {}", self.patched.len())?;
        writeln!(f, "Already patched: {}", self.already_patched)?;
        writeln!(f, "Not applicable: {}", self.not_applicable)?;
        writeln!(f, "Cached (skipped): {}", self.cached)?;
        write_errors(f, &self.errors, "patch")?;
        write_codesign(f, &self.codesign)?;
        if self.errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "Tip: If Cursor behaves unexpectedly after patching, run:")?;
            writeln!(f, "  cgp unpatch")?;
        }
        Ok(())
    }
}

/// Result of an `unpatch` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpatchReport {
    /// Files restored (or that would be, in a dry run).
    pub restored: Vec<PathBuf>,
    pub no_backup: Vec<PathBuf>,
    pub errors: Vec<ReportError>,
    pub codesign: Vec<CodesignOutcome>,
}

impl UnpatchReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn record(&mut self, err: PatchError, fallback: &Path) {
        let entry = ReportError::from_error(&err, fallback);
        tracing::warn!("{}: {}", entry.path.display(), entry.message);
        self.errors.push(entry);
    }
}

impl fmt::Display for UnpatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Restored: {}", self.restored.len())?;
        writeln!(f, "No backup: {}", self.no_backup.len())?;
        write_errors(f, &self.errors, "unpatch")?;
        write_codesign(f, &self.codesign)
    }
}

/// Patch state of one target file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub path: PathBuf,
    pub label: String,
    pub patch_names: Vec<PatchKind>,
    /// Marker presence per patch.
    pub patched: BTreeMap<PatchKind, bool>,
    pub has_backup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a `status` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub installations: Vec<Installation>,
    pub files: Vec<FileStatus>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.installations.is_empty() {
            return writeln!(f, "No Cursor installations found.");
        }
        for inst in &self.installations {
            writeln!(
                f,
                "[{}] {} (version: {})",
                inst.kind,
                inst.root.display(),
                inst.version_id
            )?;
        }
        writeln!(f)?;
        if self.files.is_empty() {
            return writeln!(f, "No target files found.");
        }
        for file in &self.files {
            let states: Vec<String> = file
                .patch_names
                .iter()
                .map(|name| {
                    let state = if file.patched.get(name).copied().unwrap_or(false) {
                        "patched"
                    } else {
                        "unpatched"
                    };
                    format!("{name}:{state}")
                })
                .collect();
            let file_name = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            write!(f, "  {}/{}: {}", file.label, file_name, states.join(", "))?;
            if file.has_backup {
                write!(f, " [backup]")?;
            }
            if let Some(err) = &file.error {
                write!(f, " ERROR: {err}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
