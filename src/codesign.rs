//! Re-signing of macOS app bundles after their contents change.
//!
//! Gatekeeper re-verifies bundle signatures, so an edited `Cursor.app`
//! reports itself as damaged until it is signed again. The engine talks to
//! this through [`Resigner`] so tests can observe re-sign requests without
//! running `codesign`.

use crate::discovery::{InstallKind, Installation};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Outcome of one re-sign attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodesignOutcome {
    pub app_path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
}

pub trait Resigner {
    /// Whether modifying files in `inst` invalidates a code signature.
    fn needs_resign(&self, inst: &Installation) -> bool;

    fn resign(&self, inst: &Installation) -> CodesignOutcome;
}

/// Ad-hoc `codesign --force --deep --sign -` on the enclosing `.app`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdHocCodesign;

impl Resigner for AdHocCodesign {
    fn needs_resign(&self, inst: &Installation) -> bool {
        cfg!(target_os = "macos")
            && inst.kind == InstallKind::Gui
            && find_app_bundle(&inst.root).is_some()
    }

    fn resign(&self, inst: &Installation) -> CodesignOutcome {
        let Some(app_path) = find_app_bundle(&inst.root) else {
            return CodesignOutcome {
                app_path: inst.root.clone(),
                success: false,
                error: Some("no .app bundle found".to_string()),
            };
        };

        tracing::info!("re-signing {} with ad-hoc signature", app_path.display());
        let result = Command::new("codesign")
            .args(["--force", "--deep", "--sign", "-"])
            .arg(&app_path)
            .output();

        let error = match result {
            Ok(output) if output.status.success() => None,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                Some(if stderr.is_empty() {
                    format!("codesign exited with {}", output.status)
                } else {
                    stderr
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Some("codesign binary not found".to_string())
            }
            Err(e) => Some(e.to_string()),
        };

        if let Some(err) = &error {
            tracing::warn!("codesign failed for {}: {err}", app_path.display());
        }
        CodesignOutcome {
            app_path,
            success: error.is_none(),
            error,
        }
    }
}

/// Walk up from `app_root` (at most six levels) to the enclosing `*.app`
/// directory that has `Contents/Info.plist`.
pub fn find_app_bundle(app_root: &Path) -> Option<PathBuf> {
    let start = app_root
        .canonicalize()
        .unwrap_or_else(|_| app_root.to_path_buf());
    start
        .ancestors()
        .take(6)
        .find(|dir| {
            dir.extension().is_some_and(|ext| ext == "app")
                && dir.join("Contents").join("Info.plist").exists()
        })
        .map(Path::to_path_buf)
}
