//! The persistence seam for archived conversation chunks.

use agentmesh_core::error::StoreError;
use agentmesh_core::{ContextStats, ConversationChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A backend that persists [`ConversationChunk`]s.
///
/// All listing methods return chunks newest first.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Backend name, for logs and diagnostics.
    fn name(&self) -> &str;

    async fn insert(&self, chunk: ConversationChunk) -> Result<(), StoreError>;

    /// The user's most recent chunks.
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationChunk>, StoreError>;

    /// The user's chunks whose summary or content contains any of `terms`,
    /// case-insensitively.
    async fn search_text(
        &self,
        user_id: &str,
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<ConversationChunk>, StoreError>;

    /// Delete every chunk with `timestamp <= cutoff`. Returns the number removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn user_stats(&self, user_id: &str) -> Result<ContextStats, StoreError>;

    /// Total chunks across all users.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Whether a chunk's summary or content contains any lowercase term.
///
/// Case folding is Unicode-aware. Every backend matches through here.
pub(crate) fn chunk_matches(chunk: &ConversationChunk, terms: &[String]) -> bool {
    let summary = chunk.summary.to_lowercase();
    let content = chunk.content.to_lowercase();
    terms
        .iter()
        .any(|t| summary.contains(t.as_str()) || content.contains(t.as_str()))
}
