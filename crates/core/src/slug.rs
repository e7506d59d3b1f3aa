//! URL-safe identifiers derived from titles.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum slug length in characters.
pub const MAX_SLUG_LEN: usize = 100;
const FALLBACK_SLUG: &str = "game";

static STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("invalid slug strip regex"));
static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s_]+").expect("invalid slug separator regex"));

/// Derive a slug from `title`; `None` if nothing usable remains.
pub fn slugify(title: &str) -> Option<String> {
    let lower = title.to_lowercase();
    let stripped = STRIP_RE.replace_all(&lower, "");
    let joined = SEPARATOR_RE.replace_all(&stripped, "-");
    let truncated: String = joined.trim_matches('-').chars().take(MAX_SLUG_LEN).collect();
    let slug = truncated.trim_end_matches('-');
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

/// Hands out unique slugs, suffixing `-2`, `-3`, … on collision.
#[derive(Debug, Default, Clone)]
pub struct SlugAllocator {
    taken: HashSet<String>,
}

impl SlugAllocator {
    /// Start with no reserved slugs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `taken` already reserved.
    pub fn with_taken(taken: impl IntoIterator<Item = String>) -> Self {
        Self {
            taken: taken.into_iter().collect(),
        }
    }

    /// Reserve an exact slug. Returns `false` if it was already taken.
    pub fn reserve(&mut self, slug: &str) -> bool {
        self.taken.insert(slug.to_string())
    }

    /// Allocate a fresh slug for `title`.
    pub fn allocate(&mut self, title: &str) -> String {
        let base = slugify(title).unwrap_or_else(|| FALLBACK_SLUG.to_string());
        if self.taken.insert(base.clone()) {
            return base;
        }

        let mut suffix = 2usize;
        loop {
            let candidate = format!("{base}-{suffix}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}
