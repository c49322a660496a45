//! Patch orchestration over discovered installations.
//!
//! Installations are processed one at a time and files in table order.
//! For each installation the forward flow is:
//!
//! ```text
//! scan (cache skip | patch) -> loader hash sync -> checksum sync -> commit | rollback
//! ```
//!
//! Errors are accumulated in the report; nothing here panics or returns
//! early on a per-file failure.

mod apply;
mod restore;
mod status;
mod sync;

pub use apply::patch;
pub use restore::unpatch;
pub use status::status;
pub use sync::{checksum_b64, sync_checksums, sync_loader_hashes, HashPair};
