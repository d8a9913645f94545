//! Session lifecycle for AgentMesh.
//!
//! Each user has at most one live session. A session accumulates token
//! usage until it reaches the budget; the next [`SessionManager::get_or_create`]
//! archives it into the context store and starts a fresh session seeded with
//! the user's persona. Idle sessions are purged lazily on every registry
//! operation; there are no background timers.

use agentmesh_config::SessionConfig;
use agentmesh_core::persona::extract_persona;
use agentmesh_core::{SessionError, SessionInfo, SessionStats, TokenCounter};
use agentmesh_memory::ContextStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// What [`SessionManager::get_or_create`] handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: String,
    /// `true` for a fresh or rotated session.
    pub is_new: bool,
    /// `true` when an over-budget session was archived to make this one.
    pub rotated: bool,
}

#[derive(Default)]
struct Registry {
    by_session: HashMap<String, SessionInfo>,
    by_user: HashMap<String, String>,
}

impl Registry {
    fn insert(&mut self, info: SessionInfo) {
        self.by_user.insert(info.user_id.clone(), info.session_id.clone());
        self.by_session.insert(info.session_id.clone(), info);
    }

    fn remove(&mut self, session_id: &str) -> Option<SessionInfo> {
        let info = self.by_session.remove(session_id)?;
        if self.by_user.get(&info.user_id).map(String::as_str) == Some(session_id) {
            self.by_user.remove(&info.user_id);
        }
        Some(info)
    }

    /// Drop sessions idle since before `cutoff`.
    fn sweep(&mut self, cutoff: DateTime<Utc>) {
        let expired: Vec<String> = self
            .by_session
            .values()
            .filter(|s| s.last_used < cutoff)
            .map(|s| s.session_id.clone())
            .collect();
        for id in expired {
            if let Some(info) = self.remove(&id) {
                info!(session_id = %id, user = %info.user_id, "Purged idle session");
            }
        }
    }
}

/// Tracks live sessions and rotates them when they exceed the token budget.
pub struct SessionManager {
    context: Arc<ContextStore>,
    counter: Arc<dyn TokenCounter>,
    max_tokens: usize,
    idle_timeout: chrono::Duration,
    registry: RwLock<Registry>,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(context: Arc<ContextStore>, max_tokens: usize, idle_timeout: Duration) -> Self {
        Self {
            counter: Arc::clone(context.counter()),
            context,
            max_tokens,
            idle_timeout: chrono::Duration::from_std(idle_timeout)
                .unwrap_or_else(|_| chrono::Duration::days(365 * 100)),
            registry: RwLock::new(Registry::default()),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(context: Arc<ContextStore>, config: &SessionConfig) -> Self {
        Self::new(context, config.max_tokens, config.idle_timeout())
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Count tokens the same way the context store does.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    /// Give back a lock from [`Self::user_lock`], forgetting it once unshared.
    async fn release_user_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.user_locks.lock().await;
        drop(lock);
        if locks.get(user_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(user_id);
        }
    }

    /// Registry write access with idle sessions already purged.
    async fn swept(&self) -> tokio::sync::RwLockWriteGuard<'_, Registry> {
        let mut registry = self.registry.write().await;
        registry.sweep(Utc::now() - self.idle_timeout);
        registry
    }

    /// The user's live session, rotating or creating one as needed.
    pub async fn get_or_create(&self, user_id: &str) -> SessionHandle {
        let lock = self.user_lock(user_id).await;
        let handle = {
            let _guard = lock.lock().await;
            self.get_or_create_locked(user_id).await
        };
        self.release_user_lock(user_id, lock).await;
        handle
    }

    async fn get_or_create_locked(&self, user_id: &str) -> SessionHandle {
        let outgoing = {
            let mut registry = self.swept().await;
            let current = registry.by_user.get(user_id).cloned();
            match current.and_then(|id| registry.by_session.get_mut(&id)) {
                Some(session) if session.token_count < self.max_tokens => {
                    session.last_used = Utc::now();
                    return SessionHandle {
                        session_id: session.session_id.clone(),
                        is_new: false,
                        rotated: false,
                    };
                }
                Some(session) => Some(session.clone()),
                None => None,
            }
        };

        match outgoing {
            Some(old) => self.rotate(old).await,
            None => {
                let info = SessionInfo::new(new_session_id(), user_id, 0, "");
                let session_id = info.session_id.clone();
                self.registry.write().await.insert(info);
                info!(session_id = %session_id, user = %user_id, "Created session");
                SessionHandle {
                    session_id,
                    is_new: true,
                    rotated: false,
                }
            }
        }
    }

    /// Archive an over-budget session and replace it. Caller holds the user lock.
    async fn rotate(&self, old: SessionInfo) -> SessionHandle {
        let mut record = format!(
            "Session {} conversation history with {} tokens",
            old.session_id, old.token_count
        );
        if !old.persona_context.is_empty() {
            record.push_str("\nPersona context: ");
            record.push_str(&old.persona_context);
        }

        if let Err(e) = self
            .context
            .store_chunk(&old.user_id, &old.session_id, &record)
            .await
        {
            warn!(session_id = %old.session_id, error = %e, "Failed to archive session before rotation");
        }

        let persona = self.context.get_persona_context(&old.user_id).await;
        let info = SessionInfo::new(
            new_session_id(),
            old.user_id.as_str(),
            self.counter.count(&persona),
            persona,
        );
        let session_id = info.session_id.clone();

        {
            let mut registry = self.registry.write().await;
            registry.remove(&old.session_id);
            registry.insert(info);
        }

        info!(
            old_session = %old.session_id,
            new_session = %session_id,
            user = %old.user_id,
            tokens = old.token_count,
            "Rotated session over token budget"
        );
        SessionHandle {
            session_id,
            is_new: true,
            rotated: true,
        }
    }

    /// Adopt an externally created session id as the user's live session.
    ///
    /// The user's previous session is replaced. Its persona carries over
    /// unless it was over budget.
    pub async fn register(&self, session_id: &str, user_id: &str) {
        let lock = self.user_lock(user_id).await;
        {
            let _guard = lock.lock().await;
            let mut registry = self.swept().await;
            let mut persona = String::new();
            if let Some(previous) = registry.by_user.get(user_id).cloned() {
                if let Some(old) = registry.remove(&previous) {
                    if old.token_count < self.max_tokens {
                        persona = old.persona_context;
                    }
                    debug!(old_session = %previous, new_session = %session_id, "Replacing session");
                }
            }
            registry.insert(SessionInfo::new(session_id, user_id, 0, persona));
        }
        self.release_user_lock(user_id, lock).await;
    }

    /// Add usage to a session and mark it used. Stale ids are ignored.
    pub async fn update_token_count(&self, session_id: &str, input_tokens: usize, output_tokens: usize) {
        let mut registry = self.swept().await;
        match registry.by_session.get_mut(session_id) {
            Some(session) => {
                session.token_count = session
                    .token_count
                    .saturating_add(input_tokens)
                    .saturating_add(output_tokens);
                session.last_used = Utc::now();
                debug!(session_id = %session_id, tokens = session.token_count, "Updated token count");
            }
            None => warn!(session_id = %session_id, "Token update for unknown session"),
        }
    }

    /// Persona lines in a transcript.
    pub fn extract_persona(&self, transcript: &str) -> String {
        extract_persona(transcript)
    }

    /// Replace a session's persona, unless the transcript has none.
    pub async fn update_persona(&self, session_id: &str, transcript: &str) {
        let persona = extract_persona(transcript);
        let mut registry = self.swept().await;
        match registry.by_session.get_mut(session_id) {
            Some(session) if !persona.is_empty() => {
                session.persona_context = persona;
                debug!(session_id = %session_id, "Updated persona");
            }
            Some(_) => {}
            None => warn!(session_id = %session_id, "Persona update for unknown session"),
        }
    }

    pub async fn persona_context(&self, session_id: &str) -> String {
        let mut registry = self.swept().await;
        match registry.by_session.get_mut(session_id) {
            Some(session) => session.persona_context.clone(),
            None => {
                warn!(session_id = %session_id, "Persona lookup for unknown session");
                String::new()
            }
        }
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionInfo, SessionError> {
        self.swept()
            .await
            .by_session
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))
    }

    pub async fn stats(&self, session_id: &str) -> Option<SessionStats> {
        self.get(session_id).await.ok().map(|s| s.stats(self.max_tokens))
    }

    /// Snapshot of every live session, oldest first.
    pub async fn sessions(&self) -> Vec<SessionInfo> {
        let registry = self.swept().await;
        let mut all: Vec<SessionInfo> = registry.by_session.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    /// Live session id for a user, if any.
    pub async fn session_for_user(&self, user_id: &str) -> Option<String> {
        self.swept().await.by_user.get(user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.swept().await.by_session.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
