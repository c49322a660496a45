//! Locate Cursor installations (remote server and desktop app).
//!
//! Discovery is heuristic path probing. Every candidate must pass
//! [`is_cursor_app_root`] before it is returned.

use crate::config::DiscoveryConfig;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_SERVER_DATA_FOLDER: &str = ".cursor-server";

const WSL_SKIP_USERS: &[&str] = &["public", "default", "default user", "all users"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallKind {
    /// Remote SSH server under `~/.cursor-server/bin/<commit>`.
    Server,
    /// Desktop Electron app.
    Gui,
}

impl fmt::Display for InstallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallKind::Server => f.write_str("server"),
            InstallKind::Gui => f.write_str("gui"),
        }
    }
}

/// An installation root whose `product.json` names `applicationName: "cursor"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Installation {
    pub kind: InstallKind,
    pub root: PathBuf,
    pub version_id: String,
}

impl Installation {
    pub fn new(kind: InstallKind, root: impl Into<PathBuf>, version_id: impl Into<String>) -> Self {
        Self {
            kind,
            root: root.into(),
            version_id: version_id.into(),
        }
    }

    /// Validate `root` and build an installation from it.
    pub fn from_root(kind: InstallKind, root: &Path) -> Option<Self> {
        if !is_cursor_app_root(root) {
            return None;
        }
        Some(Self::new(kind, root, version_id_from_path(root)))
    }
}

fn read_product_json(root: &Path) -> Option<serde_json::Value> {
    let raw = fs::read(root.join("product.json")).ok()?;
    serde_json::from_slice(&raw).ok()
}

/// True iff `root/product.json` names the application `cursor`.
pub fn is_cursor_app_root(root: &Path) -> bool {
    read_product_json(root)
        .and_then(|doc| {
            doc.get("applicationName")
                .and_then(|v| v.as_str())
                .map(|name| name == "cursor")
        })
        .unwrap_or(false)
}

/// Commit hash for `~/.cursor-server/bin/<hash>`, otherwise the directory name.
pub fn version_id_from_path(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn server_data_folder_name(app_root: &Path) -> String {
    read_product_json(app_root)
        .and_then(|doc| {
            doc.get("serverDataFolderName")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_SERVER_DATA_FOLDER.to_string())
}

/// Normalise a folder name taken from `product.json` so it can only name a
/// directory below the home directory.
///
/// Rejects absolute paths, drive letters and `..` components.
pub fn safe_relative_folder_name(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let bytes = s.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
    {
        return None;
    }
    let s = s.replace('\\', "/");
    if s.starts_with('/') {
        return None;
    }
    let parts: Vec<&str> = s.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    if parts.is_empty() || parts.contains(&"..") {
        return None;
    }
    Some(parts.join("/"))
}

/// Discover remote server installations.
///
/// An explicit directory disables auto-discovery.
pub fn discover_server_installations(explicit: Option<&Path>) -> Vec<Installation> {
    if let Some(dir) = explicit {
        return Installation::from_root(InstallKind::Server, dir)
            .into_iter()
            .collect();
    }

    let Some(home) = home::home_dir() else {
        return Vec::new();
    };

    let mut folder_names = vec![DEFAULT_SERVER_DATA_FOLDER.to_string()];
    for gui_root in gui_candidates() {
        if !is_cursor_app_root(&gui_root) {
            continue;
        }
        if let Some(folder) = safe_relative_folder_name(&server_data_folder_name(&gui_root)) {
            if !folder_names.contains(&folder) {
                folder_names.push(folder);
            }
        }
    }
    folder_names.sort();

    let mut results = Vec::new();
    for folder in folder_names {
        let bin_dir = home.join(&folder).join("bin");
        if !bin_dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&bin_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_dir() {
                if let Some(inst) = Installation::from_root(InstallKind::Server, entry.path()) {
                    results.push(inst);
                }
            }
        }
    }
    results
}

/// Discover desktop installations.
///
/// An explicit directory disables auto-discovery.
pub fn discover_gui_installations(explicit: Option<&Path>) -> Vec<Installation> {
    if let Some(dir) = explicit {
        return Installation::from_root(InstallKind::Gui, dir)
            .into_iter()
            .collect();
    }
    gui_candidates()
        .iter()
        .filter(|p| p.is_dir())
        .filter_map(|p| Installation::from_root(InstallKind::Gui, p))
        .collect()
}

/// Server installations first, then desktop ones.
pub fn discover_all(config: &DiscoveryConfig) -> Vec<Installation> {
    let mut installations = discover_server_installations(config.server_dir.as_deref());
    installations.extend(discover_gui_installations(config.gui_dir.as_deref()));
    tracing::debug!("discovered {} installation(s)", installations.len());
    installations
}

fn gui_candidates() -> Vec<PathBuf> {
    let home = home::home_dir();
    let mut candidates = Vec::new();

    if cfg!(target_os = "macos") {
        candidates.push(PathBuf::from(
            "/Applications/Cursor.app/Contents/Resources/app",
        ));
        if let Some(home) = &home {
            candidates.push(home.join("Applications/Cursor.app/Contents/Resources/app"));
        }
    } else if cfg!(windows) {
        if let Some(local) = std::env::var_os("LOCALAPPDATA").filter(|v| !v.is_empty()) {
            let local = PathBuf::from(local);
            candidates.push(local.join("Programs").join("cursor").join("resources").join("app"));
            candidates.push(local.join("cursor").join("resources").join("app"));
        }
    } else {
        candidates.extend(
            [
                "/opt/cursor/resources/app",
                "/usr/share/cursor/resources/app",
                "/usr/lib/cursor/resources/app",
                "/snap/cursor/current/resources/app",
            ]
            .into_iter()
            .map(PathBuf::from),
        );
        if let Some(home) = &home {
            candidates.push(home.join(".local/share/cursor/resources/app"));
        }
        if is_wsl() {
            candidates.extend(wsl_gui_candidates(Path::new("/mnt/c/Users")));
        }
    }

    candidates
}

fn is_wsl() -> bool {
    fs::read_to_string("/proc/version")
        .map(|v| {
            let v = v.to_lowercase();
            v.contains("microsoft") || v.contains("wsl")
        })
        .unwrap_or(false)
}

/// Desktop install locations of every non-system Windows user, seen from WSL.
fn wsl_gui_candidates(users_dir: &Path) -> Vec<PathBuf> {
    if !users_dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(users_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().trim().to_lowercase();
            !name.is_empty() && !name.starts_with('.') && !WSL_SKIP_USERS.contains(&name.as_str())
        })
        .map(|entry| {
            entry
                .path()
                .join("AppData/Local/Programs/cursor/resources/app")
        })
        .collect()
}
