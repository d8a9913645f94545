//! Delegator: sends a task to a remote agent and classifies the outcome.
//!
//! The call never fails with an untyped error: a 200 yields the payload,
//! anything else becomes a [`DelegationError`]. No retries happen here.

use agentmesh_core::error::{DelegationError, Error, Result};
use agentmesh_core::{AgentInfo, Skill};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Who a delegation is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub server_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            server_id: server_id.into(),
        }
    }
}

// ── Wire envelope ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Correlation id
    pub id: String,
    pub message: EnvelopeMessage,
    pub metadata: RoutingMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMessage {
    pub role: String,
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingMetadata {
    pub user_id: String,
    pub server_id: String,
    pub skill_id: String,
}

impl TaskEnvelope {
    pub fn new(correlation_id: impl Into<String>, task: &str, skill: &Skill, ctx: &UserContext) -> Self {
        Self {
            id: correlation_id.into(),
            message: EnvelopeMessage {
                role: "user".into(),
                message_id: uuid::Uuid::new_v4().to_string(),
                parts: vec![TextPart { text: task.into() }],
            },
            metadata: RoutingMetadata {
                user_id: ctx.user_id.clone(),
                server_id: ctx.server_id.clone(),
                skill_id: skill.call_id().to_string(),
            },
        }
    }
}

/// Calls agents over HTTP with a bounded timeout.
pub struct Delegator {
    client: reqwest::Client,
}

impl Delegator {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Delegate with a fresh correlation id.
    pub async fn delegate(
        &self,
        agent: &AgentInfo,
        skill: &Skill,
        task: &str,
        ctx: &UserContext,
    ) -> std::result::Result<serde_json::Value, DelegationError> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        self.send(agent, TaskEnvelope::new(correlation_id, task, skill, ctx))
            .await
    }

    /// POST an envelope to the agent's base URL.
    pub async fn send(
        &self,
        agent: &AgentInfo,
        envelope: TaskEnvelope,
    ) -> std::result::Result<serde_json::Value, DelegationError> {
        let url = agent.url.trim_end_matches('/');
        debug!(
            agent = %agent.name,
            skill = %envelope.metadata.skill_id,
            correlation_id = %envelope.id,
            "Delegating task"
        );

        let target = reqwest::Url::parse(url)
            .map_err(|e| DelegationError::InvalidEnvelope(format!("agent url {url:?}: {e}")))?;
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| DelegationError::InvalidEnvelope(e.to_string()))?;

        let response = self
            .client
            .post(target)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;

        if status != reqwest::StatusCode::OK {
            warn!(agent = %agent.name, status = status.as_u16(), "Agent call failed");
            return Err(DelegationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(_) => {
                debug!(agent = %agent.name, "Agent replied with non-JSON body");
                Ok(serde_json::json!({ "response": body }))
            }
        }
    }
}

fn classify_transport(e: reqwest::Error) -> DelegationError {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else {
        "request"
    };
    DelegationError::Transport {
        kind: kind.into(),
        message: e.to_string(),
    }
}
