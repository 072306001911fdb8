//! Agent registration handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use simstate_core::Tile;

use super::error_response;
use crate::types::{
    AgentSummary, ErrorResponse, ListAgentsResponse, PositionResponse, RegisterAgentRequest,
};
use crate::AppState;

/// List registered agents.
#[utoipa::path(
    get,
    path = "/agents",
    tag = "agents",
    responses(
        (status = 200, description = "Registered agents", body = ListAgentsResponse)
    )
)]
pub async fn list_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let agents = state
        .coordinator
        .agent_ids()
        .into_iter()
        .filter_map(|agent_id| {
            // Removed between listing and lookup.
            let status = state.coordinator.status(&agent_id).ok()?;
            let position = state.coordinator.position(&agent_id).ok()?;
            Some(AgentSummary {
                status: status.as_str().to_string(),
                position: PositionResponse::new(&agent_id, position),
                agent_id,
            })
        })
        .collect();

    Json(ListAgentsResponse { agents })
}

/// Register a new agent.
#[utoipa::path(
    post,
    path = "/agents",
    tag = "agents",
    request_body = RegisterAgentRequest,
    responses(
        (status = 201, description = "Agent registered", body = PositionResponse),
        (status = 400, description = "Invalid agent id", body = ErrorResponse),
        (status = 409, description = "Agent already exists", body = ErrorResponse)
    )
)]
pub async fn register_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterAgentRequest>,
) -> impl IntoResponse {
    match state
        .coordinator
        .register_agent(&req.agent_id, Tile::new(req.x, req.y), req.timestamp)
    {
        Ok(position) => (
            StatusCode::CREATED,
            Json(PositionResponse::new(&req.agent_id, position)),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Remove an agent. Its stored snapshot is kept.
#[utoipa::path(
    delete,
    path = "/agents/{id}",
    tag = "agents",
    params(
        ("id" = String, Path, description = "Agent id")
    ),
    responses(
        (status = 200, description = "Agent removed", body = Object),
        (status = 404, description = "Agent not found", body = ErrorResponse)
    )
)]
pub async fn remove_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> impl IntoResponse {
    match state.coordinator.remove_agent(&agent_id) {
        Ok(()) => Json(serde_json::json!({
            "message": "Agent removed",
            "agent_id": agent_id
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
