//! Error types for the AgentMesh domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all AgentMesh operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Discovery errors ---
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    // --- Delegation errors ---
    #[error("Delegation error: {0}")]
    Delegation(#[from] DelegationError),

    // --- Context store errors ---
    #[error("Context store error: {0}")]
    Store(#[from] StoreError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Why a candidate address did not yield an agent.
///
/// Never surfaced to callers of `discover()`; only logged.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("{address} returned status {status}")]
    UnexpectedStatus { address: String, status: u16 },

    #[error("{address} returned a malformed agent card: {reason}")]
    MalformedCard { address: String, reason: String },

    #[error("{address} did not answer within {timeout_secs}s")]
    Timeout { address: String, timeout_secs: u64 },

    #[error("{address} unreachable: {reason}")]
    Unreachable { address: String, reason: String },
}

/// A failed call to a remote agent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DelegationError {
    #[error("Agent call failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to call agent ({kind}): {message}")]
    Transport { kind: String, message: String },

    /// The request could not be built: a bad agent URL or an envelope that
    /// would not serialize.
    #[error("Invalid request envelope: {0}")]
    InvalidEnvelope(String),
}

impl DelegationError {
    /// Short machine-readable classification.
    pub fn kind(&self) -> &str {
        match self {
            Self::Status { .. } => "status",
            Self::Transport { kind, .. } => kind,
            Self::InvalidEnvelope(_) => "invalid_envelope",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),
}
