#![allow(clippy::doc_markdown)]
#![allow(clippy::unused_async)]
#![allow(clippy::needless_for_each)]
//! `SimState` Server - REST API over the `SimState` agent state engine.
//!
//! This module provides the HTTP handlers, types and router.
//!
//! ## OpenAPI Documentation
//!
//! The API document is served at `GET /api-docs/openapi.json`.

mod decider;
mod handlers;
mod types;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

use simstate_core::Coordinator;

pub use decider::HttpDecider;
pub use types::*;

pub use handlers::{
    confirm_action, expire_plans, get_memories, get_nearby, get_position, health_check,
    list_agents, openapi_json, plan_action, plan_tick, register_agent, remove_agent,
};

// ============================================================================
// OpenAPI Documentation
// ============================================================================

/// SimState API Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SimState API",
        version = "0.3.0",
        description = "Agent state and memory engine for LLM-driven multi-agent simulations. \
            Two-phase plan/confirm protocol over per-agent episodic memory and positions.",
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "agents", description = "Agent registration"),
        (name = "plans", description = "Plan/confirm protocol"),
        (name = "queries", description = "Read-only memory and position queries")
    ),
    paths(
        handlers::health::health_check,
        handlers::agents::list_agents,
        handlers::agents::register_agent,
        handlers::agents::remove_agent,
        handlers::plans::plan_action,
        handlers::plans::confirm_action,
        handlers::plans::plan_tick,
        handlers::plans::expire_plans,
        handlers::queries::get_memories,
        handlers::queries::get_position,
        handlers::queries::get_nearby
    ),
    components(
        schemas(
            RegisterAgentRequest,
            PositionResponse,
            AgentSummary,
            ListAgentsResponse,
            PlanRequest,
            TickPlanEntry,
            TickPlanRequest,
            ConfirmRequest,
            MemoriesQuery,
            MemoryResponse,
            MemoriesResponse,
            NearbyQuery,
            NeighborResponse,
            NearbyResponse,
            ErrorResponse
        )
    )
)]
pub struct ApiDoc;

// ============================================================================
// Application State
// ============================================================================

/// Application state shared across handlers.
pub struct AppState {
    /// The agent coordinator.
    pub coordinator: Coordinator,
}

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/agents", get(list_agents).post(register_agent))
        .route("/agents/{id}", delete(remove_agent))
        .route("/agents/{id}/plan", post(plan_action))
        .route("/agents/{id}/confirm", post(confirm_action))
        .route("/agents/{id}/memories", get(get_memories))
        .route("/agents/{id}/position", get(get_position))
        .route("/agents/{id}/nearby", get(get_nearby))
        .route("/tick/plan", post(plan_tick))
        .route("/plans/expire", post(expire_plans))
        .with_state(state)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use simstate_core::Error;

    #[test]
    fn test_openapi_spec_generation() {
        let openapi = ApiDoc::openapi();
        let json = openapi.to_json().expect("Failed to serialize OpenAPI spec");
        assert!(json.contains("SimState API"), "Should contain API title");
        assert!(json.contains("0.3.0"), "Should contain version");
    }

    #[test]
    fn test_openapi_has_all_endpoints() {
        let openapi = ApiDoc::openapi();
        let json = openapi.to_json().expect("Failed to serialize OpenAPI spec");
        for path in [
            "/health",
            "/agents",
            "/agents/{id}",
            "/agents/{id}/plan",
            "/agents/{id}/confirm",
            "/agents/{id}/memories",
            "/agents/{id}/position",
            "/agents/{id}/nearby",
            "/tick/plan",
            "/plans/expire",
        ] {
            assert!(json.contains(path), "Should document {path}");
        }
    }

    #[test]
    fn test_openapi_has_schemas() {
        let openapi = ApiDoc::openapi();
        let json = openapi.to_json().expect("Failed to serialize OpenAPI spec");
        assert!(json.contains("ConfirmRequest"));
        assert!(json.contains("MemoriesResponse"));
        assert!(json.contains("ErrorResponse"));
    }

    #[test]
    fn test_confirm_request_move_needs_both_coordinates() {
        let json = r#"{
            "plan_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "timestamp": 4,
            "description": "moved to (12,10), saw a lamp",
            "salience": 4,
            "x": 12
        }"#;
        let req: ConfirmRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.into_outcome().new_tile, None);
    }

    #[test]
    fn test_memories_query_defaults() {
        let query: MemoriesQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.context, "");
        assert_eq!(query.limit, 10);
        assert_eq!(query.min_salience, 1);
    }

    #[test]
    fn test_error_status_mapping() {
        use axum::http::StatusCode;
        use handlers::status_for;

        assert_eq!(status_for(&Error::AgentNotFound("a".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&Error::InvalidSalience(0)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&Error::StaleConfirmation {
                agent_id: "a".into(),
                reason: "late".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&Error::PlanExpired {
                agent_id: "a".into(),
                plan_id: "p".into()
            }),
            StatusCode::GONE
        );
    }
}
