//! Archived conversation chunks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of past conversation kept for continuity after rotation.
///
/// Chunks are immutable once stored; only retention cleanup removes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationChunk {
    /// `<user_id>_<session_id>_<timestamp µs>`
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub content: String,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    pub tokens: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ConversationChunk {
    pub fn make_id(user_id: &str, session_id: &str, timestamp: DateTime<Utc>) -> String {
        format!("{user_id}_{session_id}_{}", timestamp.timestamp_micros())
    }
}

/// What the context store holds for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextStats {
    pub chunk_count: usize,
    pub total_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_conversation: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_conversation: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_derived_from_parts() {
        let ts = DateTime::parse_from_rfc3339("2026-01-02T03:04:05.000006Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = ConversationChunk::make_id("u1", "s9", ts);
        assert!(id.starts_with("u1_s9_"));
        assert!(id.ends_with("000006"));
    }

    #[test]
    fn embedding_omitted_when_absent() {
        let chunk = ConversationChunk {
            id: "a".into(),
            user_id: "u".into(),
            session_id: "s".into(),
            content: "User: hi".into(),
            summary: "User discussed: hi".into(),
            timestamp: Utc::now(),
            tokens: 2,
            embedding: None,
        };
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(!json.contains("embedding"));
    }
}
