//! Cursor GUI Patch: idempotent patching of Cursor's bundled JavaScript
//!
//! Applies a small set of textual patches to known extension and workbench
//! bundles inside Cursor installations, keeps the artifacts that embed
//! digests of those bundles consistent, and can reverse everything from
//! sidecar backups.
//!
//! # Architecture
//!
//! Every patch unit is a pure `&str -> String` transformation behind the
//! [`Patch`] trait, identified by a marker it embeds in its output. The
//! [`engine`] threads file content through the units, then:
//!
//! - rewrites hex SHA-256 literals in the extension host loader,
//! - refreshes the base64 `checksums` table in `product.json`,
//! - rolls back the whole installation if anything failed after a write.
//!
//! # Safety
//!
//! - A backup is written before the first mutation of any file
//! - Atomic file writes (tempfile + fsync + rename)
//! - Cache entries are trusted only while mtime and size match
//! - Idempotent operations
//!
//! # Example
//!
//! ```no_run
//! use cursor_gui_patch::{discover_all, engine, AdHocCodesign, DiscoveryConfig, PatchOptions};
//!
//! let installations = discover_all(&DiscoveryConfig::resolve(None, None));
//! let report = engine::patch(&installations, &PatchOptions::default(), &AdHocCodesign);
//! print!("{report}");
//! ```

pub mod backup;
pub mod cache;
pub mod codesign;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod fsutil;
pub mod patches;
pub mod report;
pub mod targets;

// Re-exports
pub use codesign::{AdHocCodesign, CodesignOutcome, Resigner};
pub use config::{DiscoveryConfig, PatchOptions};
pub use discovery::{discover_all, InstallKind, Installation};
pub use error::PatchError;
pub use patches::{get_patch, OutcomeKind, Patch, PatchKind, PatchOutcome};
pub use report::{FileStatus, PatchReport, ReportError, StatusReport, UnpatchReport};
pub use targets::{target_files, TargetFile};
