//! SQLite chunk store.
//!
//! One table, `conversation_chunks`, indexed on `user_id`, `session_id` and
//! `timestamp`. Timestamps are fixed-width RFC 3339 strings with microsecond
//! precision, so lexical order is chronological order. Embeddings are
//! little-endian f32 BLOBs.

use crate::store::{ChunkStore, chunk_matches};
use agentmesh_core::error::StoreError;
use agentmesh_core::{ContextStats, ConversationChunk};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A persistent chunk store backed by SQLite.
pub struct SqliteChunkStore {
    pool: SqlitePool,
}

impl SqliteChunkStore {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::Storage(format!("Failed to create {}: {e}", parent.display()))
                    })?;
                }
            }
            format!("sqlite://{path}")
        };

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // An in-memory database is per-connection, so keep a single one.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!(path = %path, "SQLite context store initialized");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_chunks (
                chunk_id    TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                session_id  TEXT NOT NULL,
                content     TEXT NOT NULL,
                summary     TEXT NOT NULL,
                timestamp   TEXT NOT NULL,
                tokens      INTEGER NOT NULL,
                embedding   BLOB
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversation_chunks table: {e}")))?;

        for (name, column) in [
            ("idx_chunks_user_id", "user_id"),
            ("idx_chunks_session_id", "session_id"),
            ("idx_chunks_timestamp", "timestamp"),
        ] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {name} ON conversation_chunks({column})"
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("{name}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationChunk, StoreError> {
        let id: String = row
            .try_get("chunk_id")
            .map_err(|e| StoreError::QueryFailed(format!("chunk_id column: {e}")))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| StoreError::QueryFailed(format!("user_id column: {e}")))?;
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StoreError::QueryFailed(format!("session_id column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let summary: String = row
            .try_get("summary")
            .map_err(|e| StoreError::QueryFailed(format!("summary column: {e}")))?;
        let timestamp: String = row
            .try_get("timestamp")
            .map_err(|e| StoreError::QueryFailed(format!("timestamp column: {e}")))?;
        let tokens: i64 = row
            .try_get("tokens")
            .map_err(|e| StoreError::QueryFailed(format!("tokens column: {e}")))?;
        let embedding: Option<Vec<u8>> = row
            .try_get("embedding")
            .map_err(|e| StoreError::QueryFailed(format!("embedding column: {e}")))?;

        Ok(ConversationChunk {
            id,
            user_id,
            session_id,
            content,
            summary,
            timestamp: parse_timestamp(&timestamp)?,
            tokens: tokens.max(0) as usize,
            embedding: embedding.map(|blob| blob_to_embedding(&blob)),
        })
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("Bad timestamp {s:?}: {e}")))
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, chunk: ConversationChunk) -> Result<(), StoreError> {
        let embedding_blob = chunk.embedding.as_deref().map(embedding_to_blob);

        sqlx::query(
            r#"
            INSERT INTO conversation_chunks
                (chunk_id, user_id, session_id, content, summary, timestamp, tokens, embedding)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.user_id)
        .bind(&chunk.session_id)
        .bind(&chunk.content)
        .bind(&chunk.summary)
        .bind(format_timestamp(chunk.timestamp))
        .bind(chunk.tokens as i64)
        .bind(embedding_blob.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        debug!(chunk_id = %chunk.id, "Stored chunk");
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationChunk>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_chunks WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Recent chunks: {e}")))?;

        rows.iter().map(Self::row_to_chunk).collect()
    }

    async fn search_text(
        &self,
        user_id: &str,
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<ConversationChunk>, StoreError> {
        if terms.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        // SQLite's LOWER() and LIKE fold ASCII only; match in Rust so
        // non-ASCII text folds the same way as in the in-memory store.
        let rows = sqlx::query(
            "SELECT * FROM conversation_chunks WHERE user_id = ?1 ORDER BY timestamp DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Keyword search: {e}")))?;

        let mut hits = Vec::new();
        for row in &rows {
            let chunk = Self::row_to_chunk(row)?;
            if chunk_matches(&chunk, terms) {
                hits.push(chunk);
                if hits.len() == limit {
                    break;
                }
            }
        }
        Ok(hits)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM conversation_chunks WHERE timestamp <= ?1")
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;

        Ok(result.rows_affected() as usize)
    }

    async fn user_stats(&self, user_id: &str) -> Result<ContextStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt,
                   COALESCE(SUM(tokens), 0) AS total,
                   MIN(timestamp) AS first_ts,
                   MAX(timestamp) AS last_ts
            FROM conversation_chunks WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("User stats: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| StoreError::QueryFailed(format!("total column: {e}")))?;
        let first: Option<String> = row
            .try_get("first_ts")
            .map_err(|e| StoreError::QueryFailed(format!("first_ts column: {e}")))?;
        let last: Option<String> = row
            .try_get("last_ts")
            .map_err(|e| StoreError::QueryFailed(format!("last_ts column: {e}")))?;

        Ok(ContextStats {
            chunk_count: cnt as usize,
            total_tokens: total as usize,
            first_conversation: first.as_deref().map(parse_timestamp).transpose()?,
            last_conversation: last.as_deref().map(parse_timestamp).transpose()?,
        })
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM conversation_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;

        Ok(cnt as usize)
    }
}
