//! The end-to-end message flow.
//!
//! ```text
//! message ─▶ session ─▶ persona + history ─▶ route + delegate ─▶ reply
//!               ▲                                               │
//!               └──────── tokens, persona, archive ◀────────────┘
//! ```

use crate::response::response_text;
use agentmesh_config::AppConfig;
use agentmesh_core::Result;
use agentmesh_discovery::AgentDirectory;
use agentmesh_memory::ContextStore;
use agentmesh_session::SessionManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// An inbound user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub user_id: String,
    #[serde(default)]
    pub server_id: Option<String>,
    pub message: String,
}

/// What happened to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageOutcome {
    pub session_id: String,
    pub new_session: bool,
    /// The previous session went over budget and was archived.
    pub rotated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegated_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_used: Option<String>,
    pub response: String,
    pub success: bool,
    /// Session usage after this exchange.
    pub token_count: usize,
}

/// Retrieval limits applied to every message.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalLimits {
    pub max_chunks: usize,
    pub max_tokens: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self {
            max_chunks: 5,
            max_tokens: 2000,
        }
    }
}

/// Owns the long-lived services and runs messages through them.
pub struct Coordinator {
    directory: Arc<AgentDirectory>,
    sessions: Arc<SessionManager>,
    context: Arc<ContextStore>,
    limits: RetrievalLimits,
    archive_exchanges: bool,
}

impl Coordinator {
    pub fn new(
        directory: Arc<AgentDirectory>,
        sessions: Arc<SessionManager>,
        context: Arc<ContextStore>,
    ) -> Self {
        Self {
            directory,
            sessions,
            context,
            limits: RetrievalLimits::default(),
            archive_exchanges: true,
        }
    }

    pub fn with_limits(mut self, limits: RetrievalLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_archiving(mut self, archive_exchanges: bool) -> Self {
        self.archive_exchanges = archive_exchanges;
        self
    }

    /// Build every service from configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let directory = Arc::new(AgentDirectory::from_config(config)?);
        let context = Arc::new(ContextStore::from_config(&config.context).await?);
        let sessions = Arc::new(SessionManager::from_config(Arc::clone(&context), &config.session));

        Ok(Self::new(directory, sessions, context)
            .with_limits(RetrievalLimits {
                max_chunks: config.context.max_chunks,
                max_tokens: config.context.max_tokens,
            })
            .with_archiving(config.context.archive_exchanges))
    }

    pub fn directory(&self) -> &Arc<AgentDirectory> {
        &self.directory
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn context(&self) -> &Arc<ContextStore> {
        &self.context
    }

    pub fn limits(&self) -> RetrievalLimits {
        self.limits
    }

    /// Run one message through session, context, delegation, and bookkeeping.
    pub async fn handle_message(&self, request: MessageRequest) -> MessageOutcome {
        let user_id = request.user_id.as_str();
        let handle = self.sessions.get_or_create(user_id).await;
        let session_id = handle.session_id.as_str();

        let history = self
            .context
            .retrieve(user_id, &request.message, self.limits.max_chunks, self.limits.max_tokens)
            .await;
        let mut persona = self.sessions.persona_context(session_id).await;
        if persona.is_empty() {
            persona = self.context.get_persona_context(user_id).await;
        }
        let preamble = compose_preamble(&persona, &history);

        let report = self
            .directory
            .delegate_task(&request.message, user_id, request.server_id.as_deref(), &preamble)
            .await;
        let response = response_text(&report);

        let sent = if preamble.is_empty() {
            request.message.clone()
        } else {
            format!("{preamble}\n\n{}", request.message)
        };
        self.sessions
            .update_token_count(
                session_id,
                self.sessions.count_tokens(&sent),
                self.sessions.count_tokens(&response),
            )
            .await;

        let exchange = format!("User: {}\nAgent: {}", request.message, response);
        self.sessions.update_persona(session_id, &exchange).await;

        if self.archive_exchanges {
            if let Err(e) = self.context.store_chunk(user_id, session_id, &exchange).await {
                warn!(user = %user_id, error = %e, "Failed to archive exchange");
            }
        }

        let token_count = self
            .sessions
            .stats(session_id)
            .await
            .map(|s| s.token_count)
            .unwrap_or_default();

        info!(
            user = %user_id,
            session_id = %session_id,
            agent = report.delegated_to.as_deref().unwrap_or("-"),
            success = report.success,
            "Handled message"
        );

        MessageOutcome {
            session_id: handle.session_id.clone(),
            new_session: handle.is_new,
            rotated: handle.rotated,
            delegated_to: report.delegated_to,
            skill_used: report.skill_used,
            response,
            success: report.success,
            token_count,
        }
    }
}

/// Context block sent ahead of the message: persona first, then history.
fn compose_preamble(persona: &str, history: &str) -> String {
    let mut sections = Vec::new();
    if !persona.is_empty() {
        sections.push(format!("[CHARACTER CONTEXT]\n{persona}"));
    }
    if !history.is_empty() {
        sections.push(format!("[CONVERSATION HISTORY]\n{history}"));
    }
    sections.join("\n")
}
