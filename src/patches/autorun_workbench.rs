//! Literal expression replacement.
//!
//! The workbench reads `r?.autoRunControls?.enabled??!1` to decide whether
//! team admins control auto-run. Replacing the expression with `!1` keeps
//! the UI in user-controlled mode.

use super::{Patch, Rewrite};

pub const AUTORUN_WORKBENCH_MARKER: &str = "CGP_PATCH_AUTORUN_WORKBENCH";

/// Replaces fixed literal sites with fixed literals, tagging each edit with
/// the marker as a trailing comment.
#[derive(Debug)]
pub struct LiteralReplacement {
    pub name: &'static str,
    pub marker: &'static str,
    /// `(search, replacement)` pairs, applied in order.
    pub sites: &'static [(&'static str, &'static str)],
}

impl Patch for LiteralReplacement {
    fn name(&self) -> &'static str {
        self.name
    }

    fn marker(&self) -> &'static str {
        self.marker
    }

    fn is_applicable(&self, content: &str) -> bool {
        self.sites.iter().any(|(search, _)| content.contains(search))
    }

    fn rewrite(&self, content: &str) -> Rewrite {
        let mut patched = content.to_owned();
        let mut total = 0;
        let mut notes = Vec::new();

        for (search, replacement) in self.sites {
            let count = patched.matches(search).count();
            if count == 0 {
                continue;
            }
            let tagged = format!("{replacement}/* {} */", self.marker);
            patched = patched.replace(search, &tagged);
            total += count;
            notes.push(format!("Replaced {count} occurrence(s) of {search}"));
        }

        Rewrite {
            content: patched,
            replacements: total,
            notes,
        }
    }
}
