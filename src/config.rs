//! Run configuration: explicit installation roots and patch options.
//!
//! Installation roots are resolved with the priority
//! CLI flag > environment variable > auto-discovery.

use crate::patches::PatchKind;
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

pub const ENV_SERVER_DIR: &str = "CGP_CURSOR_SERVER_DIR";
pub const ENV_GUI_DIR: &str = "CGP_CURSOR_GUI_DIR";

/// Explicit installation roots. `None` means auto-discover that kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub server_dir: Option<PathBuf>,
    pub gui_dir: Option<PathBuf>,
}

impl DiscoveryConfig {
    /// Combine CLI flags with the process environment.
    pub fn resolve(server_dir: Option<PathBuf>, gui_dir: Option<PathBuf>) -> Self {
        Self::resolve_with(server_dir, gui_dir, |key| env::var(key).ok())
    }

    /// Like [`DiscoveryConfig::resolve`], reading variables through `lookup`.
    pub fn resolve_with(
        server_dir: Option<PathBuf>,
        gui_dir: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let from_env = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            server_dir: server_dir.or_else(|| from_env(ENV_SERVER_DIR)).map(expand_tilde),
            gui_dir: gui_dir.or_else(|| from_env(ENV_GUI_DIR)).map(expand_tilde),
        }
    }
}

/// Expand a leading `~/` using the current user's home directory.
pub fn expand_tilde(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match home::home_dir() {
            Some(home) => home.join(rest),
            None => path,
        },
        Err(_) => path,
    }
}

/// Options for a forward patch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOptions {
    /// Report what would change without touching the filesystem.
    pub dry_run: bool,
    /// Ignore the staleness cache and rescan every file.
    pub force: bool,
    /// Restrict the run to these patches.
    pub only: Option<BTreeSet<PatchKind>>,
}

impl PatchOptions {
    /// Patches from `patches` allowed in this run, in their original order.
    pub fn select(&self, patches: &[PatchKind]) -> Vec<PatchKind> {
        patches
            .iter()
            .copied()
            .filter(|p| self.only.as_ref().map_or(true, |only| only.contains(p)))
            .collect()
    }

    /// Whether the staleness cache may be consulted and persisted.
    ///
    /// Dry runs never persist, and a run restricted to a subset of patches
    /// cannot vouch for the full patch set.
    pub fn uses_cache(&self) -> bool {
        !self.dry_run && self.only.is_none()
    }
}
