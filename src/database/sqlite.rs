//! SQLite connection pool, schema and shared row helpers

use crate::config::SqliteConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// SQLite connection pool type alias
pub type Pool = SqlitePool;

/// Initialize the SQLite connection pool
pub async fn init_pool(config: &SqliteConfig) -> Result<Pool> {
    info!("Initializing SQLite connection pool at {}", config.path);

    if let Some(parent) = Path::new(&config.path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let journal_mode = if config.wal_mode {
        SqliteJournalMode::Wal
    } else {
        SqliteJournalMode::Delete
    };

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(journal_mode)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    verify_database(&pool).await?;

    info!("SQLite connection pool initialized successfully");
    Ok(pool)
}

/// Verify the connection and that the FTS5 extension is compiled in
async fn verify_database(pool: &Pool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    let (fts5,): (i64,) = sqlx::query_as("SELECT sqlite_compileoption_used('ENABLE_FTS5')")
        .fetch_one(pool)
        .await?;

    if fts5 == 0 {
        return Err(Error::Database(sqlx::Error::Configuration(
            "SQLite was built without FTS5; lexical search is unavailable".into(),
        )));
    }

    Ok(())
}

/// Schema creation for the chunk and cache tables
pub mod migrations {
    use super::*;

    /// Run all migrations. Safe to call repeatedly.
    pub async fn run(pool: &Pool) -> Result<()> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                namespace TEXT NOT NULL,
                content TEXT NOT NULL,
                source_kind TEXT NOT NULL,
                source_locator TEXT,
                metadata TEXT,
                embedding BLOB,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_namespace ON knowledge_chunks(namespace)")
            .execute(pool)
            .await?;

        // External-content FTS5 table over knowledge_chunks.content
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                content,
                content='knowledge_chunks',
                content_rowid='id',
                tokenize='porter unicode61'
            )
        "#,
        )
        .execute(pool)
        .await?;

        // Triggers keep the lexical index in the same write as the chunk row
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON knowledge_chunks BEGIN
                INSERT INTO chunks_fts(rowid, content) VALUES (new.id, new.content);
            END
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON knowledge_chunks BEGIN
                INSERT INTO chunks_fts(chunks_fts, rowid, content) VALUES ('delete', old.id, old.content);
            END
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON knowledge_chunks BEGIN
                INSERT INTO chunks_fts(chunks_fts, rowid, content) VALUES ('delete', old.id, old.content);
                INSERT INTO chunks_fts(rowid, content) VALUES (new.id, new.content);
            END
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS semantic_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                namespace TEXT NOT NULL,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0,
                last_hit_at INTEGER
            )
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_namespace ON semantic_cache(namespace)")
            .execute(pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_created ON semantic_cache(created_at)")
            .execute(pool)
            .await?;

        info!("Database migrations completed");
        Ok(())
    }
}

/// Encode a vector as a little-endian f32 blob
pub(crate) fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a little-endian f32 blob. Trailing partial values are ignored.
pub(crate) fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

pub(crate) fn to_unix_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_unix_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
