//! Query router
//!
//! Picks the cheapest way to answer a message from its text alone: a canned
//! reply, or a model tier plus retrieval and web-search flags. Pure pattern
//! matching with no I/O, so one instance can be shared by every caller.

mod patterns;

use crate::config::RouterConfig;
use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};
use serde::Serialize;
use std::fmt;
use tracing::debug;

pub use patterns::{
    ACKNOWLEDGMENT_REPLY, AFFIRMATIVE_REPLY, FAREWELL_REPLY, GREETING_REPLY, THANKS_REPLY,
};

/// How much model a message needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    /// Canned reply, no model
    Instant,
    /// Lightweight model
    Fast,
    /// Default model
    Balanced,
    /// Complex reasoning
    Powerful,
}

impl ComplexityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Instant => "instant",
            ComplexityTier::Fast => "fast",
            ComplexityTier::Balanced => "balanced",
            ComplexityTier::Powerful => "powerful",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing outcome for one message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub tier: ComplexityTier,
    /// Model to call; `None` for instant replies
    pub model: Option<String>,
    /// Reply to send verbatim; only set for instant replies
    pub template_response: Option<String>,
    pub needs_retrieval: bool,
    pub needs_web_search: bool,
}

impl RouteDecision {
    fn instant(reply: &str) -> Self {
        RouteDecision {
            tier: ComplexityTier::Instant,
            model: None,
            template_response: Some(reply.to_string()),
            needs_retrieval: false,
            needs_web_search: false,
        }
    }

    /// Whether a canned reply was selected
    pub fn is_instant(&self) -> bool {
        self.tier == ComplexityTier::Instant
    }
}

/// Compiled routing rules plus the tier-to-model mapping
#[derive(Debug, Clone)]
pub struct QueryRouter {
    instant: RegexSet,
    greeting: Regex,
    thanks: Regex,
    farewell: Regex,
    affirmative: Regex,
    url: Regex,
    complex: RegexSet,
    retrieval: RegexSet,
    search: RegexSet,
    models: RouterConfig,
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Config(format!("Invalid routing pattern {:?}: {}", pattern, e)))
}

fn compile_set(patterns: &[&str]) -> Result<RegexSet> {
    RegexSetBuilder::new(patterns)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Config(format!("Invalid routing pattern set: {}", e)))
}

impl QueryRouter {
    /// Compile the pattern tables
    pub fn new(models: RouterConfig) -> Result<Self> {
        Ok(QueryRouter {
            instant: compile_set(patterns::INSTANT_PATTERNS)?,
            greeting: compile(patterns::GREETING_KEYWORDS)?,
            thanks: compile(patterns::THANKS_KEYWORDS)?,
            farewell: compile(patterns::FAREWELL_KEYWORDS)?,
            affirmative: compile(patterns::AFFIRMATIVE_KEYWORDS)?,
            url: compile(patterns::URL_PATTERN)?,
            complex: compile_set(patterns::COMPLEX_PATTERNS)?,
            retrieval: compile_set(patterns::RETRIEVAL_PATTERNS)?,
            search: compile_set(patterns::SEARCH_PATTERNS)?,
            models,
        })
    }

    /// Route a message.
    ///
    /// Precedence: instant reply, then link present (fast, no retrieval),
    /// then complex (powerful), else balanced. Retrieval and web-search
    /// flags are computed independently for the last two.
    pub fn route(&self, text: &str, has_url: bool) -> RouteDecision {
        let trimmed = text.trim();
        let preview: String = trimmed.chars().take(30).collect();

        if let Some(reply) = self.match_instant(trimmed) {
            debug!("Routed to INSTANT: '{}'", preview);
            return RouteDecision::instant(reply);
        }

        if has_url || self.url.is_match(text) {
            debug!("Routed to FAST (link): '{}'", preview);
            return RouteDecision {
                tier: ComplexityTier::Fast,
                model: Some(self.models.fast_model.clone()),
                template_response: None,
                needs_retrieval: false,
                needs_web_search: false,
            };
        }

        let (tier, model) = if self.is_complex(text) {
            (ComplexityTier::Powerful, &self.models.powerful_model)
        } else {
            (ComplexityTier::Balanced, &self.models.balanced_model)
        };

        let decision = RouteDecision {
            tier,
            model: Some(model.clone()),
            template_response: None,
            needs_retrieval: self.retrieval.is_match(text),
            needs_web_search: self.search.is_match(text),
        };

        debug!(
            "Routed to {} (retrieval={}, web_search={}): '{}'",
            tier, decision.needs_retrieval, decision.needs_web_search, preview
        );
        decision
    }

    /// Model name configured for a tier
    pub fn model_for(&self, tier: ComplexityTier) -> Option<&str> {
        match tier {
            ComplexityTier::Instant => None,
            ComplexityTier::Fast => Some(&self.models.fast_model),
            ComplexityTier::Balanced => Some(&self.models.balanced_model),
            ComplexityTier::Powerful => Some(&self.models.powerful_model),
        }
    }

    fn match_instant(&self, trimmed: &str) -> Option<&'static str> {
        if !self.instant.is_match(trimmed) {
            return None;
        }

        let reply = if self.greeting.is_match(trimmed) {
            GREETING_REPLY
        } else if self.thanks.is_match(trimmed) {
            THANKS_REPLY
        } else if self.farewell.is_match(trimmed) {
            FAREWELL_REPLY
        } else if self.affirmative.is_match(trimmed) {
            AFFIRMATIVE_REPLY
        } else {
            ACKNOWLEDGMENT_REPLY
        };

        Some(reply)
    }

    fn is_complex(&self, text: &str) -> bool {
        self.complex.is_match(text) || text.split_whitespace().count() > patterns::COMPLEX_TOKEN_LIMIT
    }
}
