//! Conversation context store for AgentMesh.
//!
//! Archives conversation chunks with extractive summaries and retrieves the
//! most relevant ones, by keyword or by embedding similarity, within a token
//! budget.

pub mod context;
pub mod embedding;
pub mod in_memory;
pub mod store;
pub mod summarizer;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use context::ContextStore;
pub use embedding::{Embedder, HashingEmbedder, HttpEmbedder, RankingStrategy};
pub use in_memory::InMemoryChunkStore;
pub use store::ChunkStore;
pub use summarizer::summarize;
pub use vector::cosine_similarity;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteChunkStore;
