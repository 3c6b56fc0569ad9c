//! Knowledge indexing from conversations
//!
//! Two entry points feed the hybrid retriever: "remember this" decisions on a
//! user message, and content fetched from a shared link.

use crate::database::{Metadata, NewChunk, SourceKind};
use crate::error::{Error, Result};
use crate::memory::HybridRetriever;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use super::context::RequestContext;

/// Longest stretch of fetched link content that is indexed
pub const MAX_LINK_CONTENT_CHARS: usize = 15_000;

/// Kind of knowledge a remembered message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Insight,
    Decision,
    Preference,
    Experience,
    Goal,
    Constraint,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Insight => "insight",
            ContentType::Decision => "decision",
            ContentType::Preference => "preference",
            ContentType::Experience => "experience",
            ContentType::Goal => "goal",
            ContentType::Constraint => "constraint",
        }
    }

    /// Parse leniently: unknown names fall back to `Insight`
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!("Invalid content_type '{}', using 'insight'", value);
            ContentType::Insight
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "insight" => Ok(ContentType::Insight),
            "decision" => Ok(ContentType::Decision),
            "preference" => Ok(ContentType::Preference),
            "experience" => Ok(ContentType::Experience),
            "goal" => Ok(ContentType::Goal),
            "constraint" => Ok(ContentType::Constraint),
            other => Err(Error::InvalidInput(format!("Unknown content type: {}", other))),
        }
    }
}

/// What was written by [`KnowledgeIndexer::remember`]
#[derive(Debug, Clone, PartialEq)]
pub struct Remembered {
    pub chunk_id: i64,
    pub content_type: ContentType,
    pub tags: Vec<String>,
}

impl Remembered {
    /// Short confirmation for the user
    pub fn confirmation(&self) -> String {
        if self.tags.is_empty() {
            format!("Added to knowledge base as '{}'", self.content_type)
        } else {
            format!(
                "Added to knowledge base as '{}' with tags: {}",
                self.content_type,
                self.tags.join(", ")
            )
        }
    }
}

/// Writes conversation knowledge into the retriever
#[derive(Clone)]
pub struct KnowledgeIndexer {
    retriever: Arc<HybridRetriever>,
}

impl KnowledgeIndexer {
    /// Create a new indexer
    pub fn new(retriever: Arc<HybridRetriever>) -> Self {
        KnowledgeIndexer { retriever }
    }

    /// Index a user message (or key information extracted from it) into the
    /// request's namespace. `content_type` names outside [`ContentType`] are
    /// stored as `insight`. Blank content is rejected before any write.
    pub async fn remember(
        &self,
        ctx: &RequestContext,
        content: &str,
        content_type: &str,
        tags: Vec<String>,
    ) -> Result<Remembered> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("Cannot remember empty content".into()));
        }

        let content_type = ContentType::parse_or_default(content_type);
        let tags: Vec<String> = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let mut metadata = Metadata::new();
        metadata.insert("content_type".into(), Value::from(content_type.as_str()));
        metadata.insert("tags".into(), Value::from(tags.clone()));
        metadata.insert("author".into(), Value::from(ctx.author.clone()));
        metadata.insert("message_id".into(), Value::from(ctx.message_id));
        metadata.insert("timestamp".into(), Value::from(ctx.received_at.to_rfc3339()));

        let chunk = NewChunk::new(&ctx.namespace, content, SourceKind::ConversationMessage)
            .with_metadata(metadata);
        let chunk_id = self.retriever.index(chunk).await?;

        info!(
            "Indexed user message ({}) to '{}' as chunk {}",
            content_type, ctx.namespace, chunk_id
        );

        Ok(Remembered {
            chunk_id,
            content_type,
            tags,
        })
    }

    /// Index content fetched from a shared link, truncated to
    /// [`MAX_LINK_CONTENT_CHARS`]
    pub async fn index_url_content(
        &self,
        ctx: &RequestContext,
        url: &str,
        content: &str,
    ) -> Result<i64> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput(format!("No content fetched from {}", url)));
        }

        let content: String = content.chars().take(MAX_LINK_CONTENT_CHARS).collect();

        let mut metadata = Metadata::new();
        metadata.insert("shared_by".into(), Value::from(ctx.author.clone()));
        metadata.insert("message_id".into(), Value::from(ctx.message_id));
        metadata.insert("timestamp".into(), Value::from(ctx.received_at.to_rfc3339()));

        let chunk = NewChunk::new(&ctx.namespace, content, SourceKind::ExternalLink)
            .with_locator(url)
            .with_metadata(metadata);
        let chunk_id = self.retriever.index(chunk).await?;

        info!(
            "Indexed link content to '{}': {}",
            ctx.namespace,
            url.chars().take(50).collect::<String>()
        );
        Ok(chunk_id)
    }
}
