//! Embedding strategies for semantic retrieval.
//!
//! [`RankingStrategy`] is chosen once at construction: either chunks and
//! queries are embedded and ranked by cosine similarity, or no vectors are
//! computed at all and retrieval matches keywords.

use agentmesh_config::{ContextConfig, RankingMode};
use agentmesh_core::error::{Error, Result, StoreError};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// Turns text into a fixed-size vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, StoreError>;
}

/// How the context store ranks chunks on retrieval.
#[derive(Clone)]
pub enum RankingStrategy {
    Semantic(Arc<dyn Embedder>),
    Keyword,
}

impl RankingStrategy {
    pub fn label(&self) -> &str {
        match self {
            Self::Semantic(_) => "semantic",
            Self::Keyword => "keyword",
        }
    }

    /// Build the configured strategy.
    pub fn from_config(config: &ContextConfig) -> Result<Self> {
        if config.ranking == RankingMode::Keyword {
            return Ok(Self::Keyword);
        }

        let embedding = &config.embedding;
        let embedder: Arc<dyn Embedder> = match embedding.provider.as_str() {
            "hashed" => Arc::new(HashingEmbedder::new(embedding.dimensions)),
            "openai" => Arc::new(HttpEmbedder::new(
                &embedding.api_url,
                embedding.api_key.clone().unwrap_or_default(),
                &embedding.model,
                embedding.dimensions,
            )?),
            other => {
                return Err(Error::Config {
                    message: format!("semantic ranking needs an embedding provider, got {other:?}"),
                });
            }
        };
        Ok(Self::Semantic(embedder))
    }
}

impl std::fmt::Debug for RankingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Semantic(e) => write!(f, "Semantic({})", e.name()),
            Self::Keyword => write!(f, "Keyword"),
        }
    }
}

// ── OpenAI-compatible HTTP embedder ──

/// Calls an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
            client,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, StoreError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
            "encoding_format": "float",
        });

        debug!(model = %self.model, chars = text.len(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::EmbeddingFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::EmbeddingFailed(format!(
                "HTTP {}: {text}",
                status.as_u16()
            )));
        }

        let parsed: EmbeddingApiResponse = response
            .json()
            .await
            .map_err(|e| StoreError::EmbeddingFailed(format!("Bad response: {e}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| StoreError::EmbeddingFailed("Empty embedding response".into()))
    }
}

// ── Offline hashing embedder ──

/// Deterministic bag-of-words feature hashing.
///
/// Each lowercase word is hashed with SHA-256 into a signed bucket and the
/// vector is L2-normalized, so texts sharing words have positive similarity.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = Sha256::digest(word.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&hash[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if hash[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashed"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, StoreError> {
        Ok(self.embed_sync(text))
    }
}
