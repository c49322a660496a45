//! Early-return injection.
//!
//! Matches a fixed method opening such as `async getAutoRunControls(){` and
//! inserts `return void 0/* MARKER */;` right after the brace. The original
//! body stays in place, unreachable, so no brace matching is needed.

use super::{Patch, Rewrite};
use regex::Regex;

pub const AUTORUN_MARKER: &str = "CGP_PATCH_AUTORUN_DISABLED";

#[derive(Debug)]
pub struct EarlyReturnInjection {
    name: &'static str,
    marker: &'static str,
    method: &'static str,
    opening: Regex,
}

impl EarlyReturnInjection {
    /// Build a unit that disables `async <method>()`.
    pub fn new(name: &'static str, marker: &'static str, method: &'static str) -> Self {
        let pattern = format!(r"async\s+{}\s*\(\s*\)\s*\{{", regex::escape(method));
        Self {
            name,
            marker,
            method,
            opening: Regex::new(&pattern).expect("escaped method name forms a valid pattern"),
        }
    }

    fn injection(&self) -> String {
        format!("return void 0/* {} */;", self.marker)
    }
}

impl Patch for EarlyReturnInjection {
    fn name(&self) -> &'static str {
        self.name
    }

    fn marker(&self) -> &'static str {
        self.marker
    }

    fn is_applicable(&self, content: &str) -> bool {
        content.contains(self.method) && self.opening.is_match(content)
    }

    fn rewrite(&self, content: &str) -> Rewrite {
        let injection = self.injection();
        let mut count = 0;
        let patched = self
            .opening
            .replace_all(content, |caps: &regex::Captures<'_>| {
                count += 1;
                format!("{}{}", &caps[0], injection)
            })
            .into_owned();

        Rewrite {
            content: patched,
            replacements: count,
            notes: vec![format!("Injected early return in {count} method(s)")],
        }
    }
}
