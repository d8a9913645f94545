//! The context store: archives conversation chunks and retrieves them.
//!
//! Retrieval never fails: storage and embedding errors degrade to recency
//! order or to an empty string. Output is a newline-joined list of
//! `[Previous context - YYYY-MM-DD]: <summary>` lines whose estimated token
//! count stays within the caller's budget.

use crate::embedding::RankingStrategy;
use crate::in_memory::InMemoryChunkStore;
use crate::store::ChunkStore;
use crate::summarizer::summarize;
use crate::vector::rank_by_similarity;
use agentmesh_config::ContextConfig;
use agentmesh_core::error::{Result, StoreError};
use agentmesh_core::persona::summary_has_persona;
use agentmesh_core::{ContextStats, ConversationChunk, HeuristicCounter, TokenCounter};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, info, warn};

/// Chunks considered for semantic ranking.
pub const SEMANTIC_CANDIDATES: usize = 50;
/// Chunks inspected by [`ContextStore::get_persona_context`].
pub const PERSONA_WINDOW: usize = 10;
/// Persona summaries returned by [`ContextStore::get_persona_context`].
pub const PERSONA_SUMMARIES: usize = 3;
/// Shortest query word used for keyword matching.
pub const MIN_KEYWORD_CHARS: usize = 3;

/// Archive and retrieval of conversation history.
pub struct ContextStore {
    store: Arc<dyn ChunkStore>,
    strategy: RankingStrategy,
    counter: Arc<dyn TokenCounter>,
    /// Last issued chunk timestamp, in microseconds.
    last_issued: AtomicI64,
}

impl ContextStore {
    pub fn new(store: Arc<dyn ChunkStore>, strategy: RankingStrategy) -> Self {
        Self {
            store,
            strategy,
            counter: Arc::new(HeuristicCounter),
            last_issued: AtomicI64::new(i64::MIN),
        }
    }

    /// Replace the token counter.
    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// Keyword ranking over an in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryChunkStore::new()), RankingStrategy::Keyword)
    }

    /// SQLite store at the configured path with the configured ranking.
    #[cfg(feature = "sqlite")]
    pub async fn from_config(config: &ContextConfig) -> Result<Self> {
        let strategy = RankingStrategy::from_config(config)?;
        let store = crate::sqlite::SqliteChunkStore::new(&config.db_path()).await?;
        info!(ranking = strategy.label(), "Context store ready");
        Ok(Self::new(Arc::new(store), strategy))
    }

    pub fn strategy(&self) -> &RankingStrategy {
        &self.strategy
    }

    pub fn backend_name(&self) -> &str {
        self.store.name()
    }

    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    /// Wall clock, never earlier than the last issued chunk timestamp.
    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let micros = wall.max(self.last_issued.load(Ordering::SeqCst));
        DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
    }

    /// A strictly increasing timestamp for a new chunk.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let previous = self
            .last_issued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wall.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|v| v);
        let issued = wall.max(previous.saturating_add(1));
        DateTime::from_timestamp_micros(issued).unwrap_or_else(Utc::now)
    }

    // ── Archive ──

    /// Summarize, embed, and persist a transcript. Returns the chunk id.
    pub async fn store_chunk(
        &self,
        user_id: &str,
        session_id: &str,
        text: &str,
    ) -> std::result::Result<String, StoreError> {
        let timestamp = self.next_timestamp();
        let id = ConversationChunk::make_id(user_id, session_id, timestamp);
        let summary = summarize(text);
        let tokens = self.counter.count(text);

        let embedding = match &self.strategy {
            RankingStrategy::Semantic(embedder) => match embedder.embed(text).await {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(chunk_id = %id, error = %e, "Embedding failed; storing chunk without vector");
                    None
                }
            },
            RankingStrategy::Keyword => None,
        };

        self.store
            .insert(ConversationChunk {
                id: id.clone(),
                user_id: user_id.into(),
                session_id: session_id.into(),
                content: text.into(),
                summary,
                timestamp,
                tokens,
                embedding,
            })
            .await?;

        debug!(chunk_id = %id, user = %user_id, tokens, "Archived conversation chunk");
        Ok(id)
    }

    // ── Retrieval ──

    /// Relevant archived context for `query`, within `max_chunks` and `max_tokens`.
    pub async fn retrieve(&self, user_id: &str, query: &str, max_chunks: usize, max_tokens: usize) -> String {
        if max_chunks == 0 || max_tokens == 0 {
            return String::new();
        }

        let ranked = match &self.strategy {
            RankingStrategy::Semantic(embedder) if !query.trim().is_empty() => {
                match embedder.embed(query).await {
                    Ok(query_embedding) => self
                        .store
                        .recent(user_id, SEMANTIC_CANDIDATES)
                        .await
                        .map(|chunks| {
                            rank_by_similarity(chunks, &query_embedding)
                                .into_iter()
                                .map(|(_, c)| c)
                                .collect::<Vec<_>>()
                        }),
                    Err(e) => {
                        warn!(user = %user_id, error = %e, "Query embedding failed; using recent context");
                        Ok(vec![])
                    }
                }
            }
            _ => {
                let terms = keyword_terms(query);
                self.store.search_text(user_id, &terms, max_chunks).await
            }
        };

        let chunks = match ranked {
            Ok(chunks) if !chunks.is_empty() => chunks,
            Ok(_) => match self.store.recent(user_id, max_chunks).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(user = %user_id, error = %e, "Context lookup failed");
                    return String::new();
                }
            },
            Err(e) => {
                warn!(user = %user_id, error = %e, "Context lookup failed");
                return String::new();
            }
        };

        self.assemble(chunks, max_chunks, max_tokens)
    }

    /// Greedily append formatted summaries until the next would exceed the budget.
    fn assemble(&self, chunks: Vec<ConversationChunk>, max_chunks: usize, max_tokens: usize) -> String {
        let mut out = String::new();
        for chunk in chunks.into_iter().take(max_chunks) {
            let line = format!(
                "[Previous context - {}]: {}",
                chunk.timestamp.format("%Y-%m-%d"),
                chunk.summary
            );
            let candidate = if out.is_empty() {
                line
            } else {
                format!("{out}\n{line}")
            };
            if self.counter.count(&candidate) > max_tokens {
                break;
            }
            out = candidate;
        }
        out
    }

    /// Persona-bearing summaries from the user's recent chunks.
    pub async fn get_persona_context(&self, user_id: &str) -> String {
        let recent = match self.store.recent(user_id, PERSONA_WINDOW).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(user = %user_id, error = %e, "Persona lookup failed");
                return String::new();
            }
        };

        let traits: Vec<&str> = recent
            .iter()
            .map(|c| c.summary.as_str())
            .filter(|s| summary_has_persona(s))
            .collect();
        let start = traits.len().saturating_sub(PERSONA_SUMMARIES);
        traits[start..].join(" | ")
    }

    // ── Maintenance ──

    /// Delete chunks older than `days_old` days. `0` deletes everything.
    pub async fn cleanup(&self, days_old: u32) -> std::result::Result<usize, StoreError> {
        let cutoff = self.now() - chrono::Duration::days(i64::from(days_old));
        let removed = self.store.delete_older_than(cutoff).await?;
        info!(days_old, removed, "Cleaned up old conversation chunks");
        Ok(removed)
    }

    pub async fn user_stats(&self, user_id: &str) -> std::result::Result<ContextStats, StoreError> {
        self.store.user_stats(user_id).await
    }

    pub async fn count(&self) -> std::result::Result<usize, StoreError> {
        self.store.count().await
    }
}

/// The whole query plus each distinct word of at least three characters.
fn keyword_terms(query: &str) -> Vec<String> {
    let whole = query.trim().to_lowercase();
    if whole.is_empty() {
        return vec![];
    }
    let mut terms = vec![whole.clone()];
    for word in whole.split_whitespace() {
        if word.chars().count() >= MIN_KEYWORD_CHARS && !terms.iter().any(|t| t == word) {
            terms.push(word.to_string());
        }
    }
    terms
}
