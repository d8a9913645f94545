//! In-memory chunk store: useful for testing and ephemeral runs.

use crate::store::{ChunkStore, chunk_matches};
use agentmesh_core::error::StoreError;
use agentmesh_core::{ContextStats, ConversationChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Stores chunks in a Vec, oldest first.
pub struct InMemoryChunkStore {
    chunks: Arc<RwLock<Vec<ConversationChunk>>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self {
            chunks: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert(&self, chunk: ConversationChunk) -> Result<(), StoreError> {
        let mut chunks = self.chunks.write().await;
        if chunks.iter().any(|c| c.id == chunk.id) {
            return Err(StoreError::Storage(format!("Duplicate chunk id {}", chunk.id)));
        }
        chunks.push(chunk);
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationChunk>, StoreError> {
        let chunks = self.chunks.read().await;
        let mut mine: Vec<ConversationChunk> = chunks
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        mine.truncate(limit);
        Ok(mine)
    }

    async fn search_text(
        &self,
        user_id: &str,
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<ConversationChunk>, StoreError> {
        if terms.is_empty() {
            return Ok(vec![]);
        }
        let chunks = self.chunks.read().await;
        let mut hits: Vec<ConversationChunk> = chunks
            .iter()
            .filter(|c| c.user_id == user_id && chunk_matches(c, terms))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut chunks = self.chunks.write().await;
        let before = chunks.len();
        chunks.retain(|c| c.timestamp > cutoff);
        Ok(before - chunks.len())
    }

    async fn user_stats(&self, user_id: &str) -> Result<ContextStats, StoreError> {
        let chunks = self.chunks.read().await;
        let mut stats = ContextStats::default();
        for c in chunks.iter().filter(|c| c.user_id == user_id) {
            stats.chunk_count += 1;
            stats.total_tokens += c.tokens;
            stats.first_conversation = Some(match stats.first_conversation {
                Some(first) => first.min(c.timestamp),
                None => c.timestamp,
            });
            stats.last_conversation = Some(match stats.last_conversation {
                Some(last) => last.max(c.timestamp),
                None => c.timestamp,
            });
        }
        Ok(stats)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.chunks.read().await.len())
    }
}
