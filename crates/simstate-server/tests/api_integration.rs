#![allow(clippy::doc_markdown)]
//! Integration tests for the SimState REST API.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use async_trait::async_trait;
use simstate_core::{
    AgentAction, Coordinator, DecisionError, DecisionMaker, DecisionRequest, JsonFileStore,
    RoomDef, SimConfig, Tile,
};
use simstate_server::{router, AppState};

/// Always walks to (12, 10).
struct WalkToLamp;

#[async_trait]
impl DecisionMaker for WalkToLamp {
    async fn decide(&self, _request: &DecisionRequest) -> Result<AgentAction, DecisionError> {
        Ok(AgentAction::Move {
            to: Tile::new(12, 10),
        })
    }
}

fn test_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.spatial.rooms = vec![RoomDef::rect("hall", Tile::new(0, 0), Tile::new(19, 19))];
    config
}

/// Helper to create test app with all routes
fn create_test_app() -> Router {
    let coordinator = Coordinator::builder(test_config(), Arc::new(WalkToLamp))
        .build()
        .expect("Failed to build coordinator");
    router(Arc::new(AppState { coordinator }))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app.clone().oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Invalid JSON")
    };
    (status, json)
}

async fn register(app: &Router, agent_id: &str, x: i32, y: i32) {
    let (status, _) = send(
        app,
        "POST",
        "/agents",
        Some(json!({ "agent_id": agent_id, "x": x, "y": y })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["info"]["title"], "SimState API");
}

#[tokio::test]
async fn test_register_and_list_agents() {
    let app = create_test_app();
    register(&app, "b2", 1, 1).await;
    register(&app, "a1", 10, 10).await;

    let (status, json) = send(&app, "GET", "/agents", None).await;

    assert_eq!(status, StatusCode::OK);
    let agents = json["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0]["agent_id"], "a1");
    assert_eq!(agents[0]["status"], "idle");
    assert_eq!(agents[0]["position"]["room"], "hall");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = create_test_app();
    register(&app, "a1", 10, 10).await;

    let (status, json) = send(
        &app,
        "POST",
        "/agents",
        Some(json!({ "agent_id": "a1", "x": 0, "y": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "SIM-008");
}

#[tokio::test]
async fn test_plan_confirm_flow() {
    // Arrange
    let app = create_test_app();
    register(&app, "a1", 10, 10).await;

    // Act
    let (status, proposal) = send(
        &app,
        "POST",
        "/agents/a1/plan",
        Some(json!({ "perception": { "timestamp": 3 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(proposal["action"]["type"], "move");
    assert_eq!(proposal["degraded"], false);

    let (status, ack) = send(
        &app,
        "POST",
        "/agents/a1/confirm",
        Some(json!({
            "plan_id": proposal["plan_id"],
            "timestamp": 4,
            "description": "moved to (12,10), saw a lamp",
            "salience": 4,
            "x": 12,
            "y": 10
        })),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["moved"], true);

    let (_, position) = send(&app, "GET", "/agents/a1/position", None).await;
    assert_eq!(position["x"], 12);
    assert_eq!(position["y"], 10);

    let (_, memories) = send(
        &app,
        "GET",
        "/agents/a1/memories?context=lamp&limit=5&min_salience=1",
        None,
    )
    .await;
    let memories = memories["memories"].as_array().unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0]["salience"], 4);
}

#[tokio::test]
async fn test_protocol_errors() {
    let app = create_test_app();
    register(&app, "a1", 10, 10).await;
    let plan = json!({ "perception": { "timestamp": 1 } });

    let (first, _) = send(&app, "POST", "/agents/a1/plan", Some(plan.clone())).await;
    let (second, in_flight) = send(&app, "POST", "/agents/a1/plan", Some(plan)).await;
    let (stale, stale_body) = send(
        &app,
        "POST",
        "/agents/a1/confirm",
        Some(json!({
            "plan_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "timestamp": 2,
            "description": "late",
            "salience": 2
        })),
    )
    .await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(in_flight["code"], "SIM-003");
    assert_eq!(stale, StatusCode::CONFLICT);
    assert_eq!(stale_body["code"], "SIM-004");
}

#[tokio::test]
async fn test_invalid_salience_is_bad_request() {
    let app = create_test_app();
    register(&app, "a1", 10, 10).await;

    let (status, json) = send(
        &app,
        "GET",
        "/agents/a1/memories?context=lamp&min_salience=11",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "SIM-001");
}

#[tokio::test]
async fn test_unknown_agent_is_not_found() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/agents/ghost/position", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "SIM-007");
}

#[tokio::test]
async fn test_nearby_and_remove() {
    let app = create_test_app();
    register(&app, "a1", 10, 10).await;
    register(&app, "b2", 11, 11).await;

    let (_, nearby) = send(&app, "GET", "/agents/a1/nearby?radius=2", None).await;
    let (removed, _) = send(&app, "DELETE", "/agents/b2", None).await;
    // Other agents' cached results expire by TTL; a fresh radius misses the cache.
    let (_, after) = send(&app, "GET", "/agents/a1/nearby?radius=3", None).await;

    assert_eq!(nearby["nearby"][0]["id"], "b2");
    assert_eq!(nearby["nearby"][0]["kind"], "agent");
    assert_eq!(nearby["nearby"][0]["distance"], 1);
    assert_eq!(removed, StatusCode::OK);
    assert!(after["nearby"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_tick_plan_and_expire() {
    let app = create_test_app();
    register(&app, "a1", 10, 10).await;

    let (status, json) = send(
        &app,
        "POST",
        "/tick/plan",
        Some(json!({
            "agents": [
                { "agent_id": "a1", "perception": { "timestamp": 1 } },
                { "agent_id": "ghost", "perception": { "timestamp": 1 } }
            ]
        })),
    )
    .await;
    let (expire_status, expired) = send(&app, "POST", "/plans/expire", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["proposals"][0]["degraded"], false);
    assert_eq!(json["proposals"][1]["degraded"], true);
    assert_eq!(expire_status, StatusCode::OK);
    assert!(expired["expired"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_confirm_persists_to_json_store() {
    // Arrange
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = JsonFileStore::open(dir.path()).expect("Failed to open store");
    let coordinator = Coordinator::builder(test_config(), Arc::new(WalkToLamp))
        .store(Arc::new(store))
        .build()
        .expect("Failed to build coordinator");
    let app = router(Arc::new(AppState { coordinator }));
    register(&app, "a1", 10, 10).await;

    // Act
    let (_, proposal) = send(
        &app,
        "POST",
        "/agents/a1/plan",
        Some(json!({ "perception": { "timestamp": 3 } })),
    )
    .await;
    let (status, ack) = send(
        &app,
        "POST",
        "/agents/a1/confirm",
        Some(json!({
            "plan_id": proposal["plan_id"],
            "timestamp": 4,
            "description": "moved to (12,10), saw a lamp",
            "salience": 4,
            "x": 12,
            "y": 10
        })),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["persistence"], "saved");
    let saved = std::fs::read_to_string(dir.path().join("a1.json")).expect("snapshot written");
    assert!(saved.contains("saw a lamp"));
}
