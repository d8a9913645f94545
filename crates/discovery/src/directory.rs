//! Agent directory: the service object tying discovery to delegation.
//!
//! Owns the prober, the registry, the delegator and the background task
//! tracker. Every delegation entry point refreshes the registry first and
//! reports failures as a [`DelegationReport`] rather than an error.

use crate::delegator::{Delegator, UserContext};
use crate::prober::EndpointProber;
use crate::registry::CapabilityRegistry;
use crate::router::{self, RouteDecision};
use crate::tracker::TaskTracker;
use agentmesh_config::AppConfig;
use agentmesh_core::{AgentInfo, Result, Skill};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Error text when no agent scores above zero.
pub const NO_SUITABLE_AGENT: &str = "No suitable agent found for this task";

/// Result of a delegation attempt, ready for serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelegationReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure classification: `no_match`, `not_found`, `no_skills`,
    /// `status`, `timeout`, `connect`, `request`, `cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_agents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_skills: Option<Vec<String>>,
}

impl DelegationReport {
    pub fn succeeded(agent: &str, skill: &str, result: serde_json::Value) -> Self {
        Self {
            success: true,
            delegated_to: Some(agent.into()),
            skill_used: Some(skill.into()),
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn failed(kind: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            error_kind: Some(kind.into()),
            ..Self::default()
        }
    }
}

/// A background delegation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRequest {
    pub task: String,
    pub user_id: String,
    #[serde(default)]
    pub server_id: Option<String>,
    /// Target agent; routed by score when absent.
    #[serde(default)]
    pub agent: Option<String>,
    /// Target skill on `agent`; selected by tags when absent.
    #[serde(default)]
    pub skill: Option<String>,
}

/// Discovery, routing, and delegation behind one handle.
pub struct AgentDirectory {
    prober: EndpointProber,
    registry: RwLock<CapabilityRegistry>,
    delegator: Delegator,
    tracker: TaskTracker<DelegationReport>,
    default_server_id: String,
}

impl AgentDirectory {
    pub fn new(prober: EndpointProber, delegator: Delegator, default_server_id: impl Into<String>) -> Self {
        Self {
            prober,
            registry: RwLock::new(CapabilityRegistry::new()),
            delegator,
            tracker: TaskTracker::new(),
            default_server_id: default_server_id.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            EndpointProber::from_config(&config.discovery)?,
            Delegator::new(config.delegation.timeout())?,
            &config.delegation.server_id,
        ))
    }

    pub fn prober(&self) -> &EndpointProber {
        &self.prober
    }

    // ── Discovery ──

    /// Probe all candidates and merge the results into the registry.
    ///
    /// Returns only the agents found in this cycle. Never fails.
    pub async fn discover(&self) -> Vec<AgentInfo> {
        let found = self.prober.probe_all().await;
        let mut registry = self.registry.write().await;
        for agent in &found {
            registry.upsert(agent.clone());
        }
        info!(found = found.len(), known = registry.len(), "Discovery cycle complete");
        found
    }

    /// Register an agent without probing.
    pub async fn register(&self, agent: AgentInfo) -> bool {
        self.registry.write().await.upsert(agent)
    }

    /// Snapshot of known agents, in registry order.
    pub async fn agents(&self) -> Vec<AgentInfo> {
        self.registry.read().await.list().to_vec()
    }

    pub async fn agent(&self, name: &str) -> Option<AgentInfo> {
        self.registry.read().await.get(name).cloned()
    }

    pub async fn capabilities_summary(&self) -> String {
        self.registry.read().await.capabilities_summary()
    }

    // ── Routing ──

    /// Refresh the registry, then route.
    pub async fn route(&self, task: &str) -> RouteDecision {
        self.discover().await;
        self.route_known(task).await
    }

    /// Route over the registry as it is.
    pub async fn route_known(&self, task: &str) -> RouteDecision {
        let registry = self.registry.read().await;
        router::route(registry.list(), task)
    }

    // ── Delegation ──

    /// Discover, route, select a skill, delegate.
    pub async fn delegate_task(
        &self,
        task: &str,
        user_id: &str,
        server_id: Option<&str>,
        additional_context: &str,
    ) -> DelegationReport {
        let decision = self.route(task).await;

        let (agent, skill) = match decision {
            RouteDecision::Matched { agent, skill, .. } => (agent, skill),
            RouteDecision::NoMatch => {
                let available = self.capabilities_summary().await;
                warn!(task = %task, "No suitable agent found");
                return DelegationReport {
                    available_agents: Some(available),
                    ..DelegationReport::failed("no_match", NO_SUITABLE_AGENT)
                };
            }
        };

        let Some(skill) = skill else {
            return DelegationReport {
                delegated_to: Some(agent.name.clone()),
                ..DelegationReport::failed(
                    "no_skills",
                    format!("Agent {} has no available skills", agent.name),
                )
            };
        };

        let text = compose_task(task, additional_context);
        let ctx = self.user_context(user_id, server_id);
        self.dispatch(&agent, &skill, &text, &ctx).await
    }

    /// Call a named agent and skill directly, bypassing scoring.
    pub async fn call_specific_agent(
        &self,
        agent_name: &str,
        skill_name: &str,
        user_id: &str,
        server_id: Option<&str>,
        task: &str,
    ) -> DelegationReport {
        self.discover().await;
        self.delegate_to_named(agent_name, Some(skill_name), task, user_id, server_id)
            .await
    }

    async fn delegate_to_named(
        &self,
        agent_name: &str,
        skill_name: Option<&str>,
        task: &str,
        user_id: &str,
        server_id: Option<&str>,
    ) -> DelegationReport {
        let (agent, available) = {
            let registry = self.registry.read().await;
            (registry.get(agent_name).cloned(), registry.names().join(", "))
        };

        let Some(agent) = agent else {
            return DelegationReport {
                available_agents: Some(available),
                ..DelegationReport::failed("not_found", format!("Agent '{agent_name}' not found"))
            };
        };

        let skill = match skill_name {
            Some(name) => agent.find_skill(name),
            None => router::select_skill(&agent, task),
        };

        let Some(skill) = skill.cloned() else {
            let error = match skill_name {
                Some(name) => format!("Skill '{name}' not found on agent '{agent_name}'"),
                None => format!("Agent {agent_name} has no available skills"),
            };
            return DelegationReport {
                available_skills: Some(
                    agent.skills.iter().map(|s| s.display_name().to_string()).collect(),
                ),
                ..DelegationReport::failed("not_found", error)
            };
        };

        let ctx = self.user_context(user_id, server_id);
        self.dispatch(&agent, &skill, task, &ctx).await
    }

    async fn dispatch(&self, agent: &AgentInfo, skill: &Skill, task: &str, ctx: &UserContext) -> DelegationReport {
        info!(agent = %agent.name, skill = %skill.display_name(), user = %ctx.user_id, "Delegating");
        match self.delegator.delegate(agent, skill, task, ctx).await {
            Ok(result) => DelegationReport::succeeded(&agent.name, skill.display_name(), result),
            Err(e) => {
                error!(agent = %agent.name, error = %e, "Delegation failed");
                DelegationReport {
                    delegated_to: Some(agent.name.clone()),
                    skill_used: Some(skill.display_name().to_string()),
                    ..DelegationReport::failed(e.kind(), e.to_string())
                }
            }
        }
    }

    fn user_context(&self, user_id: &str, server_id: Option<&str>) -> UserContext {
        UserContext::new(
            user_id,
            server_id
                .filter(|s| !s.is_empty())
                .unwrap_or(&self.default_server_id),
        )
    }

    // ── Background delegations ──

    /// Run a delegation in the background. Returns its correlation id.
    pub async fn spawn_delegation(self: &Arc<Self>, request: DelegationRequest) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let directory = Arc::clone(self);
        self.tracker
            .spawn(id.clone(), async move {
                let server_id = request.server_id.as_deref();
                match request.agent.as_deref() {
                    Some(agent) => {
                        directory.discover().await;
                        directory
                            .delegate_to_named(
                                agent,
                                request.skill.as_deref(),
                                &request.task,
                                &request.user_id,
                                server_id,
                            )
                            .await
                    }
                    None => {
                        directory
                            .delegate_task(&request.task, &request.user_id, server_id, "")
                            .await
                    }
                }
            })
            .await;
        id
    }

    pub async fn cancel(&self, id: &str) -> bool {
        self.tracker.cancel(id).await
    }

    /// Wait for a background delegation. `None` if the id is unknown.
    pub async fn join(&self, id: &str) -> Option<DelegationReport> {
        let outcome = self.tracker.join(id).await?;
        Some(outcome.unwrap_or_else(|e| {
            let kind = if e.is_cancelled() { "cancelled" } else { "panicked" };
            DelegationReport::failed(kind, format!("Background delegation {id} {kind}"))
        }))
    }

    pub async fn in_flight(&self) -> Vec<String> {
        self.tracker.in_flight().await
    }

    pub async fn tracked(&self) -> Vec<String> {
        self.tracker.tracked().await
    }
}

/// Prepend caller context to a task.
fn compose_task(task: &str, additional_context: &str) -> String {
    let context = additional_context.trim();
    if context.is_empty() {
        task.to_string()
    } else {
        format!("{context}\n\n{task}")
    }
}
