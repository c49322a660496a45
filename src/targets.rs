//! Static table of patchable files per installation kind.

use crate::discovery::{InstallKind, Installation};
use crate::patches::PatchKind;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One row of the target table.
#[derive(Debug, Clone, Copy)]
pub struct TargetSpec {
    pub kinds: &'static [InstallKind],
    /// Extension name or bundle name shown in reports.
    pub label: &'static str,
    /// Path relative to the installation root.
    pub rel_path: &'static str,
    /// Patches to run, in order.
    pub patches: &'static [PatchKind],
}

const ANY: &[InstallKind] = &[InstallKind::Server, InstallKind::Gui];

pub const TARGETS: &[TargetSpec] = &[
    TargetSpec {
        kinds: ANY,
        label: "cursor-agent-exec",
        rel_path: "extensions/cursor-agent-exec/dist/main.js",
        patches: &[PatchKind::Autorun],
    },
    TargetSpec {
        kinds: ANY,
        label: "cursor-always-local",
        rel_path: "extensions/cursor-always-local/dist/main.js",
        patches: &[PatchKind::Models],
    },
    TargetSpec {
        kinds: ANY,
        label: "cursor-retrieval",
        rel_path: "extensions/cursor-retrieval/dist/main.js",
        patches: &[PatchKind::Models],
    },
    TargetSpec {
        kinds: ANY,
        label: "cursor-commits",
        rel_path: "extensions/cursor-commits/dist/main.js",
        patches: &[PatchKind::Models],
    },
    TargetSpec {
        kinds: &[InstallKind::Gui],
        label: "workbench.desktop.main.js",
        rel_path: "out/vs/workbench/workbench.desktop.main.js",
        patches: &[PatchKind::AutorunWorkbench],
    },
];

/// Bundle whose source embeds SHA-256 literals of the extension files.
pub const LOADER_REL_PATH: &str = "out/vs/workbench/api/node/extensionHostProcess.js";

/// Manifest carrying the `checksums` table.
pub const MANIFEST_REL_PATH: &str = "product.json";

/// Subtree the `checksums` keys are relative to.
pub const CHECKSUM_SUBTREE: &str = "out";

/// A file selected for patching in this run.
#[derive(Debug, Clone, Serialize)]
pub struct TargetFile {
    pub path: PathBuf,
    pub label: &'static str,
    pub patches: Vec<PatchKind>,
}

impl TargetSpec {
    pub fn applies_to(&self, kind: InstallKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Existing target files of `inst`, in table order.
pub fn target_files(inst: &Installation) -> Vec<TargetFile> {
    TARGETS
        .iter()
        .filter(|spec| spec.applies_to(inst.kind))
        .map(|spec| TargetFile {
            path: inst.root.join(spec.rel_path),
            label: spec.label,
            patches: spec.patches.to_vec(),
        })
        .filter(|target| target.path.is_file())
        .collect()
}

pub fn loader_path(root: &Path) -> PathBuf {
    root.join(LOADER_REL_PATH)
}

pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_REL_PATH)
}

/// The two auxiliary files rewritten to keep the installation consistent.
pub fn auxiliary_paths(root: &Path) -> [PathBuf; 2] {
    [loader_path(root), manifest_path(root)]
}
