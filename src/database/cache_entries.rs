//! Semantic cache entry storage

use crate::database::sqlite::{blob_to_vector, from_unix_millis, to_unix_millis, vector_to_blob};
use crate::database::Pool;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// A remembered query/response pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Entry ID
    pub id: i64,
    /// Namespace (topic)
    pub namespace: String,
    /// Original query text
    pub query: String,
    /// Cached response
    pub response: String,
    /// When the entry was created
    pub created_at: DateTime<Utc>,
    /// Number of hits served
    pub hit_count: i64,
    /// Last time the entry served a hit
    pub last_hit_at: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct CacheEntryRow {
    id: i64,
    namespace: String,
    query: String,
    response: String,
    created_at: i64,
    hit_count: i64,
    last_hit_at: Option<i64>,
}

impl From<CacheEntryRow> for CacheEntry {
    fn from(row: CacheEntryRow) -> Self {
        CacheEntry {
            id: row.id,
            namespace: row.namespace,
            query: row.query,
            response: row.response,
            created_at: from_unix_millis(row.created_at),
            hit_count: row.hit_count,
            last_hit_at: row.last_hit_at.map(from_unix_millis),
        }
    }
}

/// Per-namespace capacity policy applied on insert
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    /// Maximum entries per namespace
    pub max_entries: usize,
    /// Extra entries removed per eviction pass
    pub headroom: usize,
}

impl EvictionPolicy {
    /// Number of entries to remove before inserting into a namespace that
    /// currently holds `count` entries.
    pub fn evictions_needed(&self, count: usize) -> usize {
        if count + 1 > self.max_entries {
            count + 1 - self.max_entries + self.headroom
        } else {
            0
        }
    }
}

/// Outcome of an insert
#[derive(Debug, Clone, Default)]
pub struct InsertOutcome {
    /// ID of the new entry
    pub id: i64,
    /// IDs evicted to make room
    pub evicted: Vec<i64>,
}

/// Aggregate cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheEntryStats {
    /// Entries across all namespaces
    pub total_entries: i64,
    /// Hits across all entries
    pub total_hits: i64,
    /// Entry count per namespace
    pub by_namespace: HashMap<String, i64>,
}

/// Cache entry store backed by SQLite
#[derive(Clone)]
pub struct CacheEntryStore {
    pool: Pool,
}

impl CacheEntryStore {
    /// Create a new cache entry store
    pub fn new(pool: Pool) -> Self {
        CacheEntryStore { pool }
    }

    /// Insert an entry, evicting the oldest entries of the namespace first
    /// when the policy bound would be exceeded. Runs in one transaction.
    pub async fn insert(
        &self,
        namespace: &str,
        query: &str,
        response: &str,
        embedding: &[f32],
        policy: EvictionPolicy,
    ) -> Result<InsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM semantic_cache WHERE namespace = ?")
            .bind(namespace)
            .fetch_one(&mut *tx)
            .await?;

        let to_evict = policy.evictions_needed(count.max(0) as usize);
        let evicted: Vec<i64> = if to_evict > 0 {
            sqlx::query_scalar(
                r#"
                DELETE FROM semantic_cache WHERE id IN (
                    SELECT id FROM semantic_cache
                    WHERE namespace = ?
                    ORDER BY COALESCE(last_hit_at, created_at) ASC, id ASC
                    LIMIT ?
                )
                RETURNING id
            "#,
            )
            .bind(namespace)
            .bind(to_evict as i64)
            .fetch_all(&mut *tx)
            .await?
        } else {
            Vec::new()
        };

        let result = sqlx::query(
            r#"
            INSERT INTO semantic_cache (namespace, query, response, embedding, created_at)
            VALUES (?, ?, ?, ?, ?)
        "#,
        )
        .bind(namespace)
        .bind(query)
        .bind(response)
        .bind(vector_to_blob(embedding))
        .bind(to_unix_millis(Utc::now()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(InsertOutcome {
            id: result.last_insert_rowid(),
            evicted,
        })
    }

    /// Load embeddings of entries created at or after `cutoff`
    pub async fn load_live_embeddings(
        &self,
        namespace: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(i64, Vec<f32>)>> {
        let rows: Vec<(i64, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT id, embedding FROM semantic_cache
            WHERE namespace = ? AND created_at >= ?
            ORDER BY id
        "#,
        )
        .bind(namespace)
        .bind(to_unix_millis(cutoff))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, blob)| (id, blob_to_vector(&blob)))
            .collect())
    }

    /// Response of a live entry, or `None` if it was evicted or expired
    pub async fn live_response(&self, id: i64, cutoff: DateTime<Utc>) -> Result<Option<String>> {
        let response: Option<String> = sqlx::query_scalar(
            "SELECT response FROM semantic_cache WHERE id = ? AND created_at >= ?",
        )
        .bind(id)
        .bind(to_unix_millis(cutoff))
        .fetch_optional(&self.pool)
        .await?;

        Ok(response)
    }

    /// Bump the hit counter and last-hit timestamp
    pub async fn record_hit(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE semantic_cache SET hit_count = hit_count + 1, last_hit_at = ? WHERE id = ?")
            .bind(to_unix_millis(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Get an entry by ID
    pub async fn get(&self, id: i64) -> Result<Option<CacheEntry>> {
        let row: Option<CacheEntryRow> = sqlx::query_as(
            r#"
            SELECT id, namespace, query, response, created_at, hit_count, last_hit_at
            FROM semantic_cache WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CacheEntry::from))
    }

    /// Count entries in a namespace
    pub async fn count(&self, namespace: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM semantic_cache WHERE namespace = ?")
            .bind(namespace)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Delete entries of one namespace, or of every namespace
    pub async fn delete(&self, namespace: Option<&str>) -> Result<u64> {
        let result = match namespace {
            Some(ns) => {
                sqlx::query("DELETE FROM semantic_cache WHERE namespace = ?")
                    .bind(ns)
                    .execute(&self.pool)
                    .await?
            }
            None => sqlx::query("DELETE FROM semantic_cache").execute(&self.pool).await?,
        };

        Ok(result.rows_affected())
    }

    /// Delete entries created before `cutoff`
    pub async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM semantic_cache WHERE created_at < ?")
            .bind(to_unix_millis(cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Aggregate statistics
    pub async fn stats(&self) -> Result<CacheEntryStats> {
        let (total_entries, total_hits): (i64, Option<i64>) =
            sqlx::query_as("SELECT COUNT(*), SUM(hit_count) FROM semantic_cache")
                .fetch_one(&self.pool)
                .await?;

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT namespace, COUNT(*) FROM semantic_cache GROUP BY namespace")
                .fetch_all(&self.pool)
                .await?;

        Ok(CacheEntryStats {
            total_entries,
            total_hits: total_hits.unwrap_or(0),
            by_namespace: rows.into_iter().collect(),
        })
    }

    #[cfg(test)]
    pub(crate) async fn backdate(&self, id: i64, created_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE semantic_cache SET created_at = ? WHERE id = ?")
            .bind(to_unix_millis(created_at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
