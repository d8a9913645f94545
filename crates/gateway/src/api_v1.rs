//! HTTP API v1: discovery, routing, delegation, sessions, and context.
//!
//! Endpoints:
//!
//! - `GET    /v1/agents`                 Discover and list agents
//! - `POST   /v1/route`                  Score a task without delegating
//! - `POST   /v1/delegate`               Route and delegate a task
//! - `POST   /v1/agents/{name}/call`     Call a named agent and skill
//! - `POST   /v1/tasks`                  Start a background delegation
//! - `GET    /v1/tasks`                  List background delegations
//! - `GET    /v1/tasks/{id}`             Wait for a background delegation
//! - `DELETE /v1/tasks/{id}`             Cancel a background delegation
//! - `POST   /v1/messages`               Full message flow through the coordinator
//! - `GET    /v1/sessions`               Session budget usage
//! - `GET    /v1/sessions/{id}`          One session's budget usage
//! - `GET    /v1/context/{user_id}`      Retrieve context, or stats without `?query=`
//! - `POST   /v1/context/{user_id}/chunks`  Archive a conversation chunk
//! - `POST   /v1/context/cleanup`        Delete old chunks

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use agentmesh_core::{AgentInfo, ContextStats, SessionStats};
use agentmesh_discovery::{DelegationReport, DelegationRequest, RouteDecision};
use agentmesh_orchestrator::{MessageOutcome, MessageRequest};

use crate::SharedState;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/agents", get(list_agents_handler))
        .route("/agents/{name}/call", post(call_agent_handler))
        .route("/route", post(route_handler))
        .route("/delegate", post(delegate_handler))
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route("/tasks/{id}", get(join_task_handler).delete(cancel_task_handler))
        .route("/messages", post(message_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/context/cleanup", post(cleanup_handler))
        .route("/context/{user_id}", get(get_context_handler))
        .route("/context/{user_id}/chunks", post(store_chunk_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, format!("{field} must not be empty")));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentListResponse {
    pub agents: Vec<AgentInfo>,
    pub count: usize,
    pub summary: String,
}

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub task: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    pub score: u32,
}

impl From<RouteDecision> for RouteResponse {
    fn from(decision: RouteDecision) -> Self {
        match decision {
            RouteDecision::Matched { agent, skill, score } => Self {
                matched: true,
                agent: Some(agent.name),
                skill: skill.map(|s| s.display_name().to_string()),
                score,
            },
            RouteDecision::NoMatch => Self {
                matched: false,
                agent: None,
                skill: None,
                score: 0,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DelegateRequest {
    pub task: String,
    pub user_id: String,
    #[serde(default)]
    pub server_id: Option<String>,
    /// Prepended to the task sent to the agent; not used for routing.
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub skill: String,
    pub task: String,
    pub user_id: String,
    #[serde(default)]
    pub server_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskCreatedResponse {
    pub task_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub in_flight: Vec<String>,
    pub tracked: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionStats>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextResponse {
    Retrieved {
        user_id: String,
        context: String,
    },
    Summary {
        user_id: String,
        stats: ContextStats,
        persona: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct StoreChunkRequest {
    pub session_id: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreChunkResponse {
    pub chunk_id: String,
}

/// `{}` falls back to `context.retention_days`.
#[derive(Debug, Default, Deserialize)]
pub struct CleanupRequest {
    #[serde(default)]
    pub days_old: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub days_old: u32,
    pub removed: usize,
}

// ── Agents & delegation ───────────────────────────────────────────────────

async fn list_agents_handler(State(state): State<SharedState>) -> Json<AgentListResponse> {
    let directory = state.coordinator.directory();
    directory.discover().await;
    let agents = directory.agents().await;
    let summary = directory.capabilities_summary().await;

    Json(AgentListResponse {
        count: agents.len(),
        agents,
        summary,
    })
}

async fn route_handler(
    State(state): State<SharedState>,
    Json(payload): Json<RouteRequest>,
) -> Result<Json<RouteResponse>, ApiError> {
    require_text("task", &payload.task)?;
    let decision = state.coordinator.directory().route(&payload.task).await;
    Ok(Json(decision.into()))
}

async fn delegate_handler(
    State(state): State<SharedState>,
    Json(payload): Json<DelegateRequest>,
) -> Result<Json<DelegationReport>, ApiError> {
    require_text("task", &payload.task)?;
    let report = state
        .coordinator
        .directory()
        .delegate_task(
            &payload.task,
            &payload.user_id,
            payload.server_id.as_deref(),
            payload.context.as_deref().unwrap_or_default(),
        )
        .await;
    Ok(Json(report))
}

async fn call_agent_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(payload): Json<CallRequest>,
) -> (StatusCode, Json<DelegationReport>) {
    let report = state
        .coordinator
        .directory()
        .call_specific_agent(
            &name,
            &payload.skill,
            &payload.user_id,
            payload.server_id.as_deref(),
            &payload.task,
        )
        .await;

    let status = match report.error_kind.as_deref() {
        Some("not_found") => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    (status, Json(report))
}

// ── Background tasks ──────────────────────────────────────────────────────

async fn create_task_handler(
    State(state): State<SharedState>,
    Json(payload): Json<DelegationRequest>,
) -> Result<(StatusCode, Json<TaskCreatedResponse>), ApiError> {
    require_text("task", &payload.task)?;
    let task_id = state.coordinator.directory().spawn_delegation(payload).await;
    info!(task_id = %task_id, "Background delegation started");
    Ok((StatusCode::ACCEPTED, Json(TaskCreatedResponse { task_id })))
}

async fn list_tasks_handler(State(state): State<SharedState>) -> Json<TaskListResponse> {
    let directory = state.coordinator.directory();
    Json(TaskListResponse {
        in_flight: directory.in_flight().await,
        tracked: directory.tracked().await,
    })
}

async fn join_task_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DelegationReport>, StatusCode> {
    state
        .coordinator
        .directory()
        .join(&id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn cancel_task_handler(State(state): State<SharedState>, Path(id): Path<String>) -> StatusCode {
    if state.coordinator.directory().cancel(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// ── Messages & sessions ───────────────────────────────────────────────────

async fn message_handler(
    State(state): State<SharedState>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<MessageOutcome>, ApiError> {
    require_text("message", &payload.message)?;
    require_text("user_id", &payload.user_id)?;
    Ok(Json(state.coordinator.handle_message(payload).await))
}

async fn list_sessions_handler(State(state): State<SharedState>) -> Json<SessionListResponse> {
    let sessions = state.coordinator.sessions();
    let max_tokens = sessions.max_tokens();
    let stats: Vec<SessionStats> = sessions
        .sessions()
        .await
        .iter()
        .map(|s| s.stats(max_tokens))
        .collect();

    Json(SessionListResponse {
        count: stats.len(),
        sessions: stats,
    })
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStats>, StatusCode> {
    state
        .coordinator
        .sessions()
        .stats(&id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

// ── Context ───────────────────────────────────────────────────────────────

async fn get_context_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Query(params): Query<ContextQuery>,
) -> Result<Json<ContextResponse>, ApiError> {
    let context = state.coordinator.context();

    if let Some(query) = params.query.filter(|q| !q.trim().is_empty()) {
        let limits = state.coordinator.limits();
        let retrieved = context
            .retrieve(&user_id, &query, limits.max_chunks, limits.max_tokens)
            .await;
        return Ok(Json(ContextResponse::Retrieved {
            user_id,
            context: retrieved,
        }));
    }

    let stats = context.user_stats(&user_id).await.map_err(|e| {
        warn!(user = %user_id, error = %e, "Context stats failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let persona = context.get_persona_context(&user_id).await;
    Ok(Json(ContextResponse::Summary {
        user_id,
        stats,
        persona,
    }))
}

async fn store_chunk_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Json(payload): Json<StoreChunkRequest>,
) -> Result<(StatusCode, Json<StoreChunkResponse>), ApiError> {
    require_text("content", &payload.content)?;
    let chunk_id = state
        .coordinator
        .context()
        .store_chunk(&user_id, &payload.session_id, &payload.content)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::CREATED, Json(StoreChunkResponse { chunk_id })))
}

async fn cleanup_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let days_old = payload
        .days_old
        .unwrap_or(state.config.context.retention_days);
    let removed = state
        .coordinator
        .context()
        .cleanup(days_old)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(CleanupResponse { days_old, removed }))
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayState;
    use agentmesh_config::AppConfig;
    use agentmesh_discovery::{AgentDirectory, Delegator, EndpointProber};
    use agentmesh_memory::ContextStore;
    use agentmesh_orchestrator::Coordinator;
    use agentmesh_session::SessionManager;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CARD_PATH: &str = "/.well-known/agent-card.json";

    /// An agent that rolls dice and answers every task with `reply`.
    async fn dice_agent(reply: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CARD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "dice_agent",
                "description": "Rolls dice",
                "url": server.uri(),
                "skills": [{"id": "roll", "name": "Roll", "tags": ["dice", "roll"]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": reply})))
            .mount(&server)
            .await;
        server
    }

    fn test_state(endpoints: Vec<String>) -> SharedState {
        let prober = EndpointProber::new(endpoints, CARD_PATH, Duration::from_secs(2)).unwrap();
        let delegator = Delegator::new(Duration::from_secs(5)).unwrap();
        let directory = Arc::new(AgentDirectory::new(prober, delegator, "server"));
        let context = Arc::new(ContextStore::in_memory());
        let sessions = Arc::new(SessionManager::new(Arc::clone(&context), 8000, Duration::from_secs(3600)));
        Arc::new(GatewayState {
            config: AppConfig::default(),
            coordinator: Arc::new(Coordinator::new(directory, sessions, context)),
        })
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn list_agents_discovers() {
        let agent = dice_agent("4").await;
        let app = v1_router(test_state(vec![agent.uri()]));

        let response = app.oneshot(get("/agents")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: AgentListResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(json.count, 1);
        assert_eq!(json.agents[0].name, "dice_agent");
        assert!(json.summary.contains("• dice_agent: Rolls dice"));
    }

    #[tokio::test]
    async fn route_reports_match_and_score() {
        let agent = dice_agent("4").await;
        let app = v1_router(test_state(vec![agent.uri()]));

        let response = app
            .clone()
            .oneshot(post_json("/route", serde_json::json!({"task": "roll the dice"})))
            .await
            .unwrap();
        let json: RouteResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert!(json.matched);
        assert_eq!(json.agent.as_deref(), Some("dice_agent"));
        assert_eq!(json.skill.as_deref(), Some("Roll"));
        assert_eq!(json.score, 6);

        let response = app
            .oneshot(post_json("/route", serde_json::json!({"task": "bake bread"})))
            .await
            .unwrap();
        let json: RouteResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert!(!json.matched);
        assert_eq!(json.score, 0);
    }

    #[tokio::test]
    async fn empty_task_is_rejected() {
        let app = v1_router(test_state(vec![]));
        let response = app
            .oneshot(post_json("/delegate", serde_json::json!({"task": "  ", "user_id": "u1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delegate_returns_report() {
        let agent = dice_agent("You rolled 17").await;
        let app = v1_router(test_state(vec![agent.uri()]));

        let response = app
            .oneshot(post_json("/delegate", serde_json::json!({"task": "roll a d20", "user_id": "u1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report: DelegationReport = serde_json::from_value(body_json(response).await).unwrap();
        assert!(report.success);
        assert_eq!(report.delegated_to.as_deref(), Some("dice_agent"));
        assert_eq!(report.result, Some(serde_json::json!({"response": "You rolled 17"})));
    }

    #[tokio::test]
    async fn call_unknown_agent_is_not_found() {
        let agent = dice_agent("4").await;
        let app = v1_router(test_state(vec![agent.uri()]));

        let response = app
            .oneshot(post_json(
                "/agents/ghost/call",
                serde_json::json!({"skill": "Roll", "task": "roll", "user_id": "u1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let report: DelegationReport = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(report.available_agents.as_deref(), Some("dice_agent"));
    }

    #[tokio::test]
    async fn background_task_lifecycle() {
        let agent = dice_agent("6").await;
        let app = v1_router(test_state(vec![agent.uri()]));

        let response = app
            .clone()
            .oneshot(post_json(
                "/tasks",
                serde_json::json!({"task": "roll", "user_id": "u1", "agent": "dice_agent"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let created: TaskCreatedResponse = serde_json::from_value(body_json(response).await).unwrap();

        let response = app
            .clone()
            .oneshot(get(&format!("/tasks/{}", created.task_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report: DelegationReport = serde_json::from_value(body_json(response).await).unwrap();
        assert!(report.success);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/tasks/{}", created.task_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn message_flow_creates_session() {
        let agent = dice_agent("Natural 20!").await;
        let app = v1_router(test_state(vec![agent.uri()]));

        let response = app
            .clone()
            .oneshot(post_json("/messages", serde_json::json!({"user_id": "u1", "message": "roll for me"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let outcome: MessageOutcome = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(outcome.response, "Natural 20!");
        assert!(outcome.new_session);

        let response = app
            .clone()
            .oneshot(get(&format!("/sessions/{}", outcome.session_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stats: SessionStats = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(stats.user_id, "u1");
        assert_eq!(stats.token_count, outcome.token_count);

        let response = app.oneshot(get("/sessions")).await.unwrap();
        let list: SessionListResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(list.count, 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let app = v1_router(test_state(vec![]));
        let response = app.oneshot(get("/sessions/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn store_and_retrieve_context() {
        let app = v1_router(test_state(vec![]));

        let response = app
            .clone()
            .oneshot(post_json(
                "/context/u1/chunks",
                serde_json::json!({"session_id": "s1", "content": "User: tell me about dragons\nAgent: They hoard gold."}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.clone().oneshot(get("/context/u1?query=dragons")).await.unwrap();
        let json = body_json(response).await;
        assert!(json["context"].as_str().unwrap().contains("dragons"));

        let response = app.oneshot(get("/context/u1")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["stats"]["chunk_count"], 1);
    }

    #[tokio::test]
    async fn cleanup_zero_days_removes_everything() {
        let state = test_state(vec![]);
        state
            .coordinator
            .context()
            .store_chunk("u1", "s1", "User: hello")
            .await
            .unwrap();
        let app = v1_router(state.clone());

        let response = app
            .oneshot(post_json("/context/cleanup", serde_json::json!({"days_old": 0})))
            .await
            .unwrap();
        let json: CleanupResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(json.removed, 1);
        assert_eq!(state.coordinator.context().count().await.unwrap(), 0);
    }
}
