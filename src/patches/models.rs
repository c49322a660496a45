//! Service descriptor rewrite with prefix resolution.
//!
//! Redirects the `getUsableModels` RPC descriptor to the request/response
//! types of `AvailableModels`:
//!
//! ```text
//! getUsableModels:{name:"GetUsableModels",I:X.GetUsableModelsRequest,O:X.GetUsableModelsResponse,kind:K.MethodKind.Unary}
//! getUsableModels:{name:"AvailableModels",I:P.AvailableModelsRequest,O:P.AvailableModelsResponse,kind:K.MethodKind.Unary}/* MARKER */
//! ```
//!
//! `X` and `P` are minifier-chosen module variables. `P` is resolved per site:
//!
//! 1. `X` itself, if `X.AvailableModelsRequest` occurs anywhere in the file.
//! 2. Otherwise the prefix of the `availableModels` descriptor whose offset is
//!    nearest to the site. Bundlers emit sibling service definitions next to
//!    each other, so the nearest one shares the site's module scope. Ties go
//!    to the earlier descriptor.
//! 3. Otherwise the site is left alone.

use super::{Patch, Rewrite};
use regex::{Captures, Regex};

pub const MODELS_MARKER: &str = "CGP_PATCH_MODELS_AVAILABLE";

/// An `availableModels` descriptor found in the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub offset: usize,
    pub prefix: String,
}

#[derive(Debug)]
pub struct DescriptorRewrite {
    descriptor: Regex,
    equivalent: Regex,
}

impl DescriptorRewrite {
    pub fn models() -> Self {
        Self {
            descriptor: Regex::new(
                r#"getUsableModels:\{name:"GetUsableModels",I:(\w+)\.GetUsableModelsRequest,O:(\w+)\.GetUsableModelsResponse,kind:(\w+)\.MethodKind\.Unary\}"#,
            )
            .expect("static descriptor pattern"),
            equivalent: Regex::new(
                r#"availableModels:\{name:"AvailableModels",I:(\w+)\.AvailableModelsRequest,O:(\w+)\.AvailableModelsResponse,kind:(\w+)\.MethodKind\.Unary\}"#,
            )
            .expect("static descriptor pattern"),
        }
    }

    /// All `availableModels` descriptors whose request and response share a prefix.
    pub fn candidates(&self, content: &str) -> Vec<Candidate> {
        self.equivalent
            .captures_iter(content)
            .filter(|caps| caps[1] == caps[2])
            .map(|caps| Candidate {
                offset: caps.get(0).map_or(0, |m| m.start()),
                prefix: caps[1].to_string(),
            })
            .collect()
    }

    fn resolve_prefix<'a>(
        content: &str,
        prefix: &'a str,
        offset: usize,
        candidates: &'a [Candidate],
    ) -> Option<&'a str> {
        if content.contains(&format!("{prefix}.AvailableModelsRequest")) {
            return Some(prefix);
        }
        nearest_candidate(offset, candidates).map(|c| c.prefix.as_str())
    }

    fn replacement(prefix: &str, kind: &str) -> String {
        format!(
            "getUsableModels:{{name:\"AvailableModels\",I:{prefix}.AvailableModelsRequest,O:{prefix}.AvailableModelsResponse,kind:{kind}.MethodKind.Unary}}/* {MODELS_MARKER} */"
        )
    }
}

/// The candidate nearest to `offset` by absolute distance; first one wins ties.
pub fn nearest_candidate(offset: usize, candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().min_by_key(|c| c.offset.abs_diff(offset))
}

impl Patch for DescriptorRewrite {
    fn name(&self) -> &'static str {
        "models"
    }

    fn marker(&self) -> &'static str {
        MODELS_MARKER
    }

    fn is_applicable(&self, content: &str) -> bool {
        content.contains("GetUsableModels") && content.contains("MethodKind")
    }

    fn rewrite(&self, content: &str) -> Rewrite {
        let candidates = self.candidates(content);
        let mut total = 0;

        let patched = self
            .descriptor
            .replace_all(content, |caps: &Captures<'_>| {
                let original = &caps[0];
                let (prefix, response_prefix, kind) = (&caps[1], &caps[2], &caps[3]);
                if prefix != response_prefix {
                    return original.to_string();
                }
                let offset = caps.get(0).map_or(0, |m| m.start());
                match Self::resolve_prefix(content, prefix, offset, &candidates) {
                    Some(resolved) => {
                        total += 1;
                        Self::replacement(resolved, kind)
                    }
                    None => original.to_string(),
                }
            })
            .into_owned();

        let note = if total > 0 {
            format!("Replaced {total} service descriptor(s)")
        } else {
            "Descriptor pattern found but no safe replacements available".to_string()
        };

        Rewrite {
            content: patched,
            replacements: total,
            notes: vec![note],
        }
    }
}
