use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the patching library.
///
/// Every variant except [`PatchError::UnknownPatch`] refers to a concrete
/// file, so the engine can turn it into a per-path report entry instead of
/// aborting the run.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("unknown patch: {0:?}")]
    UnknownPatch(String),

    #[error("{op} failed: {source}")]
    Io {
        path: PathBuf,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("parse failed: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("backup failed: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no backup exists")]
    MissingBackup { path: PathBuf },
}

impl PatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, op: &'static str, source: std::io::Error) -> Self {
        PatchError::Io {
            path: path.into(),
            op,
            source,
        }
    }

    /// The file this error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            PatchError::UnknownPatch(_) => None,
            PatchError::Io { path, .. }
            | PatchError::Json { path, .. }
            | PatchError::Backup { path, .. }
            | PatchError::MissingBackup { path } => Some(path),
        }
    }
}
