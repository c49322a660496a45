//! Patch units: pure text transformations over bundle content.
//!
//! Every unit follows the same contract, implemented once in
//! [`Patch::apply`]:
//!
//! 1. If the unit's marker is already present, the content is returned
//!    unchanged and the outcome is [`OutcomeKind::AlreadyPatched`]. The
//!    marker is checked first because a successful rewrite usually destroys
//!    the shape that [`Patch::is_applicable`] looks for.
//! 2. If the target shape is absent, the outcome is
//!    [`OutcomeKind::NotApplicable`].
//! 3. Otherwise the unit rewrites the content. A rewrite that edits zero
//!    sites is reported as not applicable, never as applied.
//!
//! Units never fail: unresolvable sites are skipped.

mod autorun;
mod autorun_workbench;
mod models;

pub use autorun::{EarlyReturnInjection, AUTORUN_MARKER};
pub use autorun_workbench::{LiteralReplacement, AUTORUN_WORKBENCH_MARKER};
pub use models::{DescriptorRewrite, MODELS_MARKER};

use crate::error::PatchError;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What a single [`Patch::apply`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Content was modified.
    Applied,
    /// The marker was present; nothing was attempted.
    AlreadyPatched,
    /// The target shape is absent, or no site could be rewritten.
    NotApplicable,
}

/// Result of applying one patch unit to one piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked for applied/already-patched"]
pub struct PatchOutcome {
    pub kind: OutcomeKind,
    pub replacements: usize,
    pub notes: Vec<String>,
}

impl PatchOutcome {
    fn already_patched() -> Self {
        Self {
            kind: OutcomeKind::AlreadyPatched,
            replacements: 0,
            notes: Vec::new(),
        }
    }

    fn not_applicable(notes: Vec<String>) -> Self {
        Self {
            kind: OutcomeKind::NotApplicable,
            replacements: 0,
            notes,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.kind == OutcomeKind::Applied
    }

    pub fn is_already_patched(&self) -> bool {
        self.kind == OutcomeKind::AlreadyPatched
    }

    pub fn is_not_applicable(&self) -> bool {
        self.kind == OutcomeKind::NotApplicable
    }
}

/// Output of a unit's rewrite step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub content: String,
    pub replacements: usize,
    pub notes: Vec<String>,
}

/// A named, stateless text transformation with an idempotence marker.
pub trait Patch: Send + Sync {
    /// Short identifier, e.g. `autorun`.
    fn name(&self) -> &'static str;

    /// Literal embedded in patched output.
    fn marker(&self) -> &'static str;

    /// True iff `content` contains the shape this unit targets.
    fn is_applicable(&self, content: &str) -> bool;

    /// Perform the edit. Only called on applicable, unmarked content.
    fn rewrite(&self, content: &str) -> Rewrite;

    fn is_already_patched(&self, content: &str) -> bool {
        content.contains(self.marker())
    }

    fn apply(&self, content: &str) -> (String, PatchOutcome) {
        if self.is_already_patched(content) {
            return (content.to_owned(), PatchOutcome::already_patched());
        }
        if !self.is_applicable(content) {
            return (content.to_owned(), PatchOutcome::not_applicable(Vec::new()));
        }

        let rewrite = self.rewrite(content);
        if rewrite.replacements == 0 {
            return (
                content.to_owned(),
                PatchOutcome::not_applicable(rewrite.notes),
            );
        }

        (
            rewrite.content,
            PatchOutcome {
                kind: OutcomeKind::Applied,
                replacements: rewrite.replacements,
                notes: rewrite.notes,
            },
        )
    }
}

static AUTORUN: Lazy<EarlyReturnInjection> =
    Lazy::new(|| EarlyReturnInjection::new("autorun", AUTORUN_MARKER, "getAutoRunControls"));

static AUTORUN_WORKBENCH: LiteralReplacement = LiteralReplacement {
    name: "autorun_workbench",
    marker: AUTORUN_WORKBENCH_MARKER,
    sites: &[("r?.autoRunControls?.enabled??!1", "!1")],
};

static MODELS: Lazy<DescriptorRewrite> = Lazy::new(DescriptorRewrite::models);

/// The closed set of patch units known to this tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchKind {
    Autorun,
    AutorunWorkbench,
    Models,
}

impl PatchKind {
    pub const ALL: [PatchKind; 3] = [
        PatchKind::Autorun,
        PatchKind::AutorunWorkbench,
        PatchKind::Models,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PatchKind::Autorun => "autorun",
            PatchKind::AutorunWorkbench => "autorun_workbench",
            PatchKind::Models => "models",
        }
    }

    /// The unit implementing this patch.
    pub fn patch(self) -> &'static dyn Patch {
        match self {
            PatchKind::Autorun => &*AUTORUN,
            PatchKind::AutorunWorkbench => &AUTORUN_WORKBENCH,
            PatchKind::Models => &*MODELS,
        }
    }
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchKind {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatchKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PatchError::UnknownPatch(s.to_string()))
    }
}

/// Look up a patch unit by name.
pub fn get_patch(name: &str) -> Result<&'static dyn Patch, PatchError> {
    Ok(name.parse::<PatchKind>()?.patch())
}
