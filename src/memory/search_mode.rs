//! Search mode selection
//!
//! `Fast` runs lexical ranking only and never calls the embedding provider.
//! `Hybrid` fuses lexical and vector rankings. `Auto` picks one per query
//! from the rules below.

use crate::error::Error;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Phrases that signal a conceptual question; matched as lowercase substrings
pub const SEMANTIC_PHRASES: &[&str] = &[
    "similar",
    "like",
    "related",
    "about",
    "meaning",
    "concept",
    "idea",
    "understand",
    "how does",
    "how do",
    "how to",
    "what is",
    "what are",
    "what does",
    "explain",
    "describe",
    "tell me about",
    "why",
    "compare",
    "difference",
];

/// Markers of a literal lookup (links, handles, domains)
pub const LITERAL_MARKERS: &[&str] = &["http", "www.", "@", ".com", ".org", ".io", ".net", ".dev"];

/// Queries with more whitespace-separated tokens than this go hybrid
pub const LONG_QUERY_TOKENS: usize = 8;

static YEAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").ok());

/// How a query is searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Lexical (BM25) only
    Fast,
    /// Lexical + vector, fused with RRF
    Hybrid,
    /// Decide per query
    #[default]
    Auto,
}

impl SearchMode {
    /// Resolve `Auto` against a query; `Fast` and `Hybrid` pass through
    pub fn resolve(self, query: &str) -> SearchMode {
        match self {
            SearchMode::Auto => select_mode(query),
            mode => mode,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Fast => "fast",
            SearchMode::Hybrid => "hybrid",
            SearchMode::Auto => "auto",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(SearchMode::Fast),
            "hybrid" => Ok(SearchMode::Hybrid),
            "auto" => Ok(SearchMode::Auto),
            other => Err(Error::InvalidInput(format!("Unknown search mode: {}", other))),
        }
    }
}

/// Pick `Fast` or `Hybrid` for a query. Never returns `Auto`.
///
/// Rules, first match wins:
/// 1. any semantic phrase -> Hybrid
/// 2. more than [`LONG_QUERY_TOKENS`] tokens -> Hybrid
/// 3. a literal marker or a four-digit year -> Fast
/// 4. otherwise Fast
pub fn select_mode(query: &str) -> SearchMode {
    let lower = query.to_lowercase();

    if SEMANTIC_PHRASES.iter().any(|p| lower.contains(p)) {
        return SearchMode::Hybrid;
    }

    if query.split_whitespace().count() > LONG_QUERY_TOKENS {
        return SearchMode::Hybrid;
    }

    if is_literal_lookup(&lower) {
        return SearchMode::Fast;
    }

    SearchMode::Fast
}

fn is_literal_lookup(lower: &str) -> bool {
    LITERAL_MARKERS.iter().any(|m| lower.contains(m))
        || YEAR.as_ref().is_some_and(|re| re.is_match(lower))
}
