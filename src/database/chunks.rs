//! Knowledge chunk storage with FTS5 lexical ranking

use crate::database::sqlite::{blob_to_vector, from_unix_millis, to_unix_millis, vector_to_blob};
use crate::database::Pool;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::HashMap;
use tracing::warn;

/// Opaque key/value metadata attached to a chunk
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Where a chunk's content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Content fetched from a shared link
    ExternalLink,
    /// Content taken from a conversation message
    ConversationMessage,
}

impl SourceKind {
    /// Stored column value
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ExternalLink => "url",
            SourceKind::ConversationMessage => "message",
        }
    }

    fn from_column(value: &str) -> Self {
        match value {
            "url" => SourceKind::ExternalLink,
            _ => SourceKind::ConversationMessage,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of indexed knowledge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Monotonic chunk ID
    pub id: i64,
    /// Namespace (topic) the chunk belongs to
    pub namespace: String,
    /// Text content
    pub content: String,
    /// Source kind
    pub source_kind: SourceKind,
    /// Source URL, if any
    pub source_locator: Option<String>,
    /// Structured metadata
    pub metadata: Option<Metadata>,
    /// When the chunk was indexed
    pub created_at: DateTime<Utc>,
}

/// A chunk that has not been written yet
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub namespace: String,
    pub content: String,
    pub source_kind: SourceKind,
    pub source_locator: Option<String>,
    pub metadata: Option<Metadata>,
}

impl NewChunk {
    /// Create a new chunk draft
    pub fn new(
        namespace: impl Into<String>,
        content: impl Into<String>,
        source_kind: SourceKind,
    ) -> Self {
        NewChunk {
            namespace: namespace.into(),
            content: content.into(),
            source_kind,
            source_locator: None,
            metadata: None,
        }
    }

    /// Set the source URL
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.source_locator = Some(locator.into());
        self
    }

    /// Set the metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(FromRow)]
struct ChunkRow {
    id: i64,
    namespace: String,
    content: String,
    source_kind: String,
    source_locator: Option<String>,
    metadata: Option<String>,
    created_at: i64,
}

impl From<ChunkRow> for Chunk {
    fn from(row: ChunkRow) -> Self {
        let metadata = row.metadata.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!("Discarding unreadable metadata on chunk {}: {}", row.id, e);
                None
            }
        });

        Chunk {
            id: row.id,
            namespace: row.namespace,
            content: row.content,
            source_kind: SourceKind::from_column(&row.source_kind),
            source_locator: row.source_locator,
            metadata,
            created_at: from_unix_millis(row.created_at),
        }
    }
}

/// Chunk store backed by SQLite + FTS5
#[derive(Clone)]
pub struct ChunkStore {
    pool: Pool,
}

impl ChunkStore {
    /// Create a new chunk store
    pub fn new(pool: Pool) -> Self {
        ChunkStore { pool }
    }

    /// Persist a chunk with its embedding. The FTS row is written by trigger
    /// inside the same statement. A chunk without an embedding is reachable
    /// only through lexical search.
    pub async fn insert(&self, chunk: &NewChunk, embedding: Option<&[f32]>) -> Result<i64> {
        let metadata = chunk
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO knowledge_chunks
                (namespace, content, source_kind, source_locator, metadata, embedding, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&chunk.namespace)
        .bind(&chunk.content)
        .bind(chunk.source_kind.as_str())
        .bind(&chunk.source_locator)
        .bind(metadata)
        .bind(embedding.map(vector_to_blob))
        .bind(to_unix_millis(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Fetch chunks by ID
    pub async fn get_many(&self, ids: &[i64]) -> Result<HashMap<i64, Chunk>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, namespace, content, source_kind, source_locator, metadata, created_at \
             FROM knowledge_chunks WHERE id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<ChunkRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id, Chunk::from(row)))
            .collect())
    }

    /// Load every stored embedding for a namespace, ordered by ID
    pub async fn load_embeddings(&self, namespace: &str) -> Result<Vec<(i64, Vec<f32>)>> {
        let rows: Vec<(i64, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT id, embedding FROM knowledge_chunks
            WHERE namespace = ? AND embedding IS NOT NULL
            ORDER BY id
        "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, blob)| (id, blob_to_vector(&blob)))
            .collect())
    }

    /// BM25-ranked lexical search within a namespace.
    ///
    /// Returns `(chunk_id, score)` with higher scores more relevant.
    pub async fn search_lexical(
        &self,
        namespace: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(i64, f32)>> {
        let Some(expression) = fts_match_expression(query) else {
            return Ok(vec![]);
        };

        let rows: Vec<(i64, f64)> = sqlx::query_as(
            r#"
            SELECT kc.id, bm25(chunks_fts) AS score
            FROM chunks_fts
            JOIN knowledge_chunks kc ON chunks_fts.rowid = kc.id
            WHERE chunks_fts MATCH ? AND kc.namespace = ?
            ORDER BY score, kc.id
            LIMIT ?
        "#,
        )
        .bind(&expression)
        .bind(namespace)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        // FTS5 bm25() is negative; lower is better
        Ok(rows
            .into_iter()
            .map(|(id, score)| (id, -score as f32))
            .collect())
    }

    /// Count chunks, optionally within one namespace
    pub async fn count(&self, namespace: Option<&str>) -> Result<i64> {
        let (count,): (i64,) = match namespace {
            Some(ns) => {
                sqlx::query_as("SELECT COUNT(*) FROM knowledge_chunks WHERE namespace = ?")
                    .bind(ns)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM knowledge_chunks")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(count)
    }

    /// Delete every chunk in a namespace
    pub async fn delete_namespace(&self, namespace: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM knowledge_chunks WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Build an FTS5 MATCH expression from free text.
///
/// Each alphanumeric term is quoted so user punctuation can never form FTS5
/// syntax; terms are OR-joined and BM25 ranks documents matching more of them
/// higher. Returns `None` when the text has no searchable terms.
pub(crate) fn fts_match_expression(query: &str) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();

    for term in query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let quoted = format!("\"{}\"", term.to_lowercase());
        if !terms.contains(&quoted) {
            terms.push(quoted);
        }
    }

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::testing::test_pool;

    #[test]
    fn test_fts_expression() {
        assert_eq!(
            fts_match_expression("What's new in Rust?").as_deref(),
            Some("\"what\" OR \"s\" OR \"new\" OR \"in\" OR \"rust\"")
        );
        assert_eq!(
            fts_match_expression("rust RUST rust").as_deref(),
            Some("\"rust\"")
        );
        assert!(fts_match_expression("?!  ...").is_none());
        assert!(fts_match_expression("").is_none());
    }

    #[test]
    fn test_source_kind_column_values() {
        assert_eq!(SourceKind::ExternalLink.as_str(), "url");
        assert_eq!(SourceKind::from_column("url"), SourceKind::ExternalLink);
        assert_eq!(
            SourceKind::from_column("message"),
            SourceKind::ConversationMessage
        );
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let (_dir, pool) = test_pool().await;
        let store = ChunkStore::new(pool);

        let mut metadata = Metadata::new();
        metadata.insert("content_type".into(), "insight".into());

        let draft = NewChunk::new("Health", "Morning runs improve sleep", SourceKind::ConversationMessage)
            .with_metadata(metadata);
        let id = store.insert(&draft, Some(&[0.1, 0.2][..])).await.unwrap();

        let chunks = store.get_many(&[id]).await.unwrap();
        let chunk = &chunks[&id];
        assert_eq!(chunk.namespace, "Health");
        assert_eq!(chunk.content, "Morning runs improve sleep");
        assert_eq!(chunk.source_kind, SourceKind::ConversationMessage);
        assert_eq!(
            chunk.metadata.as_ref().unwrap()["content_type"],
            serde_json::json!("insight")
        );

        let embeddings = store.load_embeddings("Health").await.unwrap();
        assert_eq!(embeddings, vec![(id, vec![0.1, 0.2])]);
    }

    #[tokio::test]
    async fn test_lexical_search_is_namespace_scoped() {
        let (_dir, pool) = test_pool().await;
        let store = ChunkStore::new(pool);

        let a = store
            .insert(
                &NewChunk::new("Wealth", "index funds have low fees", SourceKind::ConversationMessage),
                Some(&[1.0][..]),
            )
            .await
            .unwrap();
        store
            .insert(
                &NewChunk::new("Career", "index of job boards", SourceKind::ConversationMessage),
                Some(&[1.0][..]),
            )
            .await
            .unwrap();
        let c = store
            .insert(
                &NewChunk::new("Wealth", "real estate fees are high", SourceKind::ConversationMessage),
                Some(&[1.0][..]),
            )
            .await
            .unwrap();

        let results = store.search_lexical("Wealth", "index fees", 10).await.unwrap();
        let ids: Vec<i64> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids.len(), 2);
        // The chunk matching both terms ranks first
        assert_eq!(ids[0], a);
        assert!(ids.contains(&c));
        assert!(results[0].1 >= results[1].1);

        assert_eq!(store.search_lexical("Wealth", "index fees", 1).await.unwrap().len(), 1);
        let unbounded = store.search_lexical("Wealth", "index fees", usize::MAX).await.unwrap();
        assert_eq!(unbounded, results);

        assert!(store.search_lexical("Wealth", "???", 10).await.unwrap().is_empty());
        assert!(store.search_lexical("Journal", "index", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_porter_stemming_matches_variants() {
        let (_dir, pool) = test_pool().await;
        let store = ChunkStore::new(pool);

        let id = store
            .insert(
                &NewChunk::new("Ideas", "Running a marathon next spring", SourceKind::ConversationMessage),
                Some(&[1.0][..]),
            )
            .await
            .unwrap();

        let results = store.search_lexical("Ideas", "runs", 5).await.unwrap();
        assert_eq!(results.first().map(|(id, _)| *id), Some(id));
    }

    #[tokio::test]
    async fn test_delete_namespace_clears_lexical_index() {
        let (_dir, pool) = test_pool().await;
        let store = ChunkStore::new(pool);

        store
            .insert(
                &NewChunk::new("Rants", "traffic was terrible", SourceKind::ConversationMessage),
                Some(&[1.0][..]),
            )
            .await
            .unwrap();
        assert_eq!(store.count(Some("Rants")).await.unwrap(), 1);

        assert_eq!(store.delete_namespace("Rants").await.unwrap(), 1);
        assert_eq!(store.count(None).await.unwrap(), 0);
        assert!(store.search_lexical("Rants", "traffic", 5).await.unwrap().is_empty());
    }
}
