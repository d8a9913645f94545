//! End-to-end integration tests for AgentMesh.
//!
//! These tests exercise the full pipeline from a user message to an agent
//! reply: discovery against live HTTP agents, routing, delegation, session
//! budgets, and the SQLite-backed context archive.

use std::sync::Arc;
use std::time::Duration;

use agentmesh_config::{AppConfig, ContextConfig, RankingMode};
use agentmesh_discovery::{AgentDirectory, Delegator, EndpointProber};
use agentmesh_gateway::{GatewayState, build_router};
use agentmesh_memory::ContextStore;
use agentmesh_orchestrator::{Coordinator, MessageRequest, RetrievalLimits};
use agentmesh_session::SessionManager;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CARD_PATH: &str = "/.well-known/agent-card.json";

// ── Mock agents ──────────────────────────────────────────────────────────

/// Start an agent that publishes `card` and answers every task with `reply`.
async fn agent(name: &str, description: &str, skills: serde_json::Value, reply: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": name,
            "description": description,
            "url": server.uri(),
            "skills": skills,
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": reply})))
        .mount(&server)
        .await;
    server
}

async fn dice_agent() -> MockServer {
    agent(
        "dice_agent",
        "Rolls dice for tabletop games",
        serde_json::json!([{"id": "roll", "name": "Roll", "description": "Roll dice", "tags": ["dice", "roll", "d20"]}]),
        "You rolled a 17.",
    )
    .await
}

async fn character_agent() -> MockServer {
    agent(
        "character_agent",
        "Plays a character",
        serde_json::json!([{"id": "chat", "name": "Chat", "description": "Talk in character", "tags": ["talk", "chat", "personality"]}]),
        "Baka! It's not like I wanted to talk to you. My name is Aiko.",
    )
    .await
}

/// An address nothing listens on.
fn dead_endpoint() -> String {
    "http://127.0.0.1:9".into()
}

// ── Wiring ───────────────────────────────────────────────────────────────

fn sqlite_config(dir: &tempfile::TempDir) -> ContextConfig {
    ContextConfig {
        db_path: Some(dir.path().join("context.sqlite").display().to_string()),
        ..ContextConfig::default()
    }
}

async fn coordinator(endpoints: Vec<String>, context: ContextConfig, max_tokens: usize) -> Coordinator {
    let prober = EndpointProber::new(endpoints, CARD_PATH, Duration::from_secs(2)).unwrap();
    let delegator = Delegator::new(Duration::from_secs(5)).unwrap();
    let directory = Arc::new(AgentDirectory::new(prober, delegator, "server"));
    let store = Arc::new(ContextStore::from_config(&context).await.unwrap());
    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&store),
        max_tokens,
        Duration::from_secs(3600),
    ));
    Coordinator::new(directory, sessions, store).with_limits(RetrievalLimits {
        max_chunks: context.max_chunks,
        max_tokens: context.max_tokens,
    })
}

fn message(user: &str, text: &str) -> MessageRequest {
    MessageRequest {
        user_id: user.into(),
        server_id: Some("guild-1".into()),
        message: text.into(),
    }
}

// ── E2E: discovery and routing ───────────────────────────────────────────

#[tokio::test]
async fn e2e_routes_each_message_to_the_matching_agent() {
    let dice = dice_agent().await;
    let character = character_agent().await;
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(
        vec![dead_endpoint(), dice.uri(), character.uri()],
        sqlite_config(&dir),
        8000,
    )
    .await;

    let rolled = coordinator.handle_message(message("u1", "roll a d20 for initiative")).await;
    assert!(rolled.success);
    assert_eq!(rolled.delegated_to.as_deref(), Some("dice_agent"));
    assert_eq!(rolled.skill_used.as_deref(), Some("Roll"));
    assert_eq!(rolled.response, "You rolled a 17.");

    let chatted = coordinator.handle_message(message("u1", "let's chat about your personality")).await;
    assert!(chatted.success);
    assert_eq!(chatted.delegated_to.as_deref(), Some("character_agent"));
    assert_eq!(chatted.session_id, rolled.session_id);

    // The dead endpoint never made it into the registry.
    let names: Vec<String> = coordinator
        .directory()
        .agents()
        .await
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(names, vec!["dice_agent", "character_agent"]);
}

#[tokio::test]
async fn e2e_envelope_carries_user_and_server() {
    let dice = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "dice_agent",
            "url": dice.uri(),
            "skills": [{"id": "roll", "name": "Roll", "tags": ["roll"]}]
        })))
        .mount(&dice)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("\"user_id\":\"u9\""))
        .and(body_string_contains("\"server_id\":\"guild-1\""))
        .and(body_string_contains("\"skill_id\":\"roll\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain text reply"))
        .expect(1)
        .mount(&dice)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(vec![dice.uri()], sqlite_config(&dir), 8000).await;

    let outcome = coordinator.handle_message(message("u9", "roll please")).await;
    assert!(outcome.success);
    assert_eq!(outcome.response, "plain text reply");
}

#[tokio::test]
async fn e2e_no_agents_reports_no_match() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(vec![dead_endpoint()], sqlite_config(&dir), 8000).await;

    let outcome = coordinator.handle_message(message("u1", "roll a d20")).await;
    assert!(!outcome.success);
    assert_eq!(outcome.response, "No suitable agent found for this task");
}

// ── E2E: context archive ─────────────────────────────────────────────────

#[tokio::test]
async fn e2e_archive_survives_reopen() {
    let dice = dice_agent().await;
    let dir = tempfile::tempdir().unwrap();

    {
        let coordinator = coordinator(vec![dice.uri()], sqlite_config(&dir), 8000).await;
        coordinator.handle_message(message("u1", "roll a d20 against the goblin")).await;
        coordinator.handle_message(message("u1", "roll dice for damage")).await;
    }

    let store = ContextStore::from_config(&sqlite_config(&dir)).await.unwrap();
    let stats = store.user_stats("u1").await.unwrap();
    assert_eq!(stats.chunk_count, 2);

    let context = store.retrieve("u1", "goblin", 5, 2000).await;
    assert!(context.starts_with("[Previous context - "));
    assert!(context.contains("goblin"));

    assert_eq!(store.cleanup(0).await.unwrap(), 2);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn e2e_semantic_ranking_with_hashed_embeddings() {
    let dice = dice_agent().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = sqlite_config(&dir);
    config.ranking = RankingMode::Semantic;
    config.embedding.provider = "hashed".into();

    let coordinator = coordinator(vec![dice.uri()], config, 8000).await;
    coordinator.handle_message(message("u1", "roll a d20 against the goblin")).await;

    let context = coordinator.context().retrieve("u1", "goblin", 1, 2000).await;
    assert!(context.contains("goblin"));
    assert_eq!(coordinator.context().strategy().label(), "semantic");
}

// ── E2E: session budget ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_rotation_archives_session_and_keeps_persona() {
    let character = character_agent().await;
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(vec![character.uri()], sqlite_config(&dir), 20).await;

    let first = coordinator
        .handle_message(message("u1", "talk to me, what is your personality?"))
        .await;
    assert!(first.new_session);
    assert!(first.token_count >= 20);

    let second = coordinator.handle_message(message("u1", "chat again")).await;
    assert!(second.rotated);
    assert_ne!(second.session_id, first.session_id);

    // The rotation record sits alongside the archived exchanges.
    let stats = coordinator.context().user_stats("u1").await.unwrap();
    assert_eq!(stats.chunk_count, 3);

    let persona = coordinator.sessions().persona_context(&second.session_id).await;
    assert!(!persona.is_empty());
}

// ── E2E: HTTP gateway ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_gateway_message_round_trip() {
    let dice = dice_agent().await;
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(vec![dice.uri()], sqlite_config(&dir), 8000).await;
    let app = build_router(Arc::new(GatewayState {
        config: AppConfig::default(),
        coordinator: Arc::new(coordinator),
    }));

    let req = Request::builder()
        .method("POST")
        .uri("/v1/messages")
        .header("Content-Type", "application/json")
        .body(Body::from(
            serde_json::json!({"user_id": "u1", "message": "roll a d20"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["response"], "You rolled a 17.");
    assert_eq!(json["delegated_to"], "dice_agent");

    let req = Request::builder()
        .uri("/v1/context/u1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["stats"]["chunk_count"], 1);
}
