//! Session records tracked by the session lifecycle manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user's live conversational context.
///
/// At most one `SessionInfo` per `user_id` is live at any instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: String,
    /// Accumulated tokens; only grows until the session is rotated.
    pub token_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    /// Persona lines carried across rotations. May be empty.
    #[serde(default)]
    pub persona_context: String,
}

impl SessionInfo {
    /// A fresh session with the given starting budget usage and persona.
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        token_count: usize,
        persona_context: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            token_count,
            created_at: now,
            last_used: now,
            persona_context: persona_context.into(),
        }
    }

    pub fn stats(&self, max_tokens: usize) -> SessionStats {
        let token_percentage = if max_tokens == 0 {
            0.0
        } else {
            self.token_count as f64 / max_tokens as f64 * 100.0
        };
        SessionStats {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            token_count: self.token_count,
            max_tokens,
            token_percentage,
            created_at: self.created_at,
            last_used: self.last_used,
            has_persona: !self.persona_context.is_empty(),
        }
    }
}

/// Budget usage report for a single session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub user_id: String,
    pub token_count: usize,
    pub max_tokens: usize,
    pub token_percentage: f64,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub has_persona: bool,
}
