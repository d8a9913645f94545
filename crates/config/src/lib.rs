//! Configuration loading, validation, and management for AgentMesh.
//!
//! Loads configuration from `~/.agentmesh/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.agentmesh/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Agent probing
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Outbound agent calls
    #[serde(default)]
    pub delegation: DelegationConfig,

    /// Session budgets and expiry
    #[serde(default)]
    pub session: SessionConfig,

    /// Conversation archive and retrieval
    #[serde(default)]
    pub context: ContextConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Candidate base addresses probed on every discovery cycle.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Path of the capability descriptor on each candidate.
    #[serde(default = "default_card_path")]
    pub card_path: String,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_endpoints() -> Vec<String> {
    (9996..=9999)
        .map(|port| format!("http://localhost:{port}"))
        .collect()
}
fn default_card_path() -> String {
    "/.well-known/agent-card.json".into()
}
fn default_probe_timeout() -> u64 {
    5
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            card_path: default_card_path(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl DiscoveryConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    #[serde(default = "default_delegation_timeout")]
    pub timeout_secs: u64,

    /// Server identifier sent in routing metadata when the caller gives none.
    #[serde(default = "default_server_id")]
    pub server_id: String,
}

fn default_delegation_timeout() -> u64 {
    30
}
fn default_server_id() -> String {
    "server".into()
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_delegation_timeout(),
            server_id: default_server_id(),
        }
    }
}

impl DelegationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Token budget after which a session is rotated.
    #[serde(default = "default_session_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_hours: u64,
}

fn default_session_max_tokens() -> usize {
    8000
}
fn default_idle_timeout() -> u64 {
    24
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_session_max_tokens(),
            idle_timeout_hours: default_idle_timeout(),
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_hours.saturating_mul(3600))
    }
}

/// How retrieval ranks archived chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    /// Substring matching, newest first
    #[default]
    Keyword,
    /// Cosine similarity over embeddings
    Semantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// SQLite file for archived chunks. Defaults to `~/.agentmesh/context.sqlite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,

    #[serde(default)]
    pub ranking: RankingMode,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    #[serde(default = "default_context_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Archive every handled exchange as a new chunk.
    #[serde(default = "default_true")]
    pub archive_exchanges: bool,
}

fn default_max_chunks() -> usize {
    5
}
fn default_context_max_tokens() -> usize {
    2000
}
fn default_retention_days() -> u32 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            ranking: RankingMode::default(),
            embedding: EmbeddingConfig::default(),
            max_chunks: default_max_chunks(),
            max_tokens: default_context_max_tokens(),
            retention_days: default_retention_days(),
            archive_exchanges: true,
        }
    }
}

impl ContextConfig {
    /// Resolved database path.
    pub fn db_path(&self) -> String {
        self.db_path.clone().unwrap_or_else(|| {
            AppConfig::config_dir()
                .join("context.sqlite")
                .display()
                .to_string()
        })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "none", "openai" (any OpenAI-compatible endpoint) or "hashed" (offline)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_provider() -> String {
    "none".into()
}
fn default_embedding_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_dimensions() -> usize {
    384
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_url: default_embedding_url(),
            api_key: None,
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentmesh/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `AGENTMESH_ENDPOINTS`: comma-separated candidate addresses
    /// - `AGENTMESH_MAX_TOKENS`: session token budget
    /// - `AGENTMESH_EMBEDDING_API_KEY`, then `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(endpoints) = lookup("AGENTMESH_ENDPOINTS") {
            self.discovery.endpoints = endpoints
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(max_tokens) = lookup("AGENTMESH_MAX_TOKENS") {
            self.session.max_tokens = max_tokens.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "AGENTMESH_MAX_TOKENS must be a positive integer, got {max_tokens:?}"
                ))
            })?;
        }

        if self.context.embedding.api_key.is_none() {
            self.context.embedding.api_key = lookup("AGENTMESH_EMBEDDING_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentmesh")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.probe_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "discovery.probe_timeout_secs must be > 0".into(),
            ));
        }
        if let Some(bad) = self
            .discovery
            .endpoints
            .iter()
            .find(|e| !(e.starts_with("http://") || e.starts_with("https://")))
        {
            return Err(ConfigError::ValidationError(format!(
                "discovery endpoint {bad:?} must be an http(s) URL"
            )));
        }
        if self.delegation.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "delegation.timeout_secs must be > 0".into(),
            ));
        }
        if self.session.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_tokens must be > 0".into(),
            ));
        }
        if self.session.idle_timeout_hours == 0 {
            return Err(ConfigError::ValidationError(
                "session.idle_timeout_hours must be > 0".into(),
            ));
        }
        if self.context.max_chunks == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_chunks must be > 0".into(),
            ));
        }
        if self.context.ranking == RankingMode::Semantic
            && self.context.embedding.provider == "none"
        {
            return Err(ConfigError::ValidationError(
                "context.ranking = \"semantic\" requires context.embedding.provider".into(),
            ));
        }
        match self.context.embedding.provider.as_str() {
            "none" | "openai" | "hashed" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "unknown embedding provider {other:?} (expected none, openai or hashed)"
            ))),
        }
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
