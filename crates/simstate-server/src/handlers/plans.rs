//! Plan/confirm handlers.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use std::time::Duration;

use super::error_response;
use crate::types::{ConfirmRequest, ErrorResponse, PlanRequest, TickPlanRequest};
use crate::AppState;

/// Ask the decision function for an agent's next action.
///
/// Nothing is committed. A degraded `observe` proposal (no `plan_id`) is
/// returned when the decision function fails or times out.
#[utoipa::path(
    post,
    path = "/agents/{id}/plan",
    tag = "plans",
    params(
        ("id" = String, Path, description = "Agent id")
    ),
    request_body = PlanRequest,
    responses(
        (status = 200, description = "Proposed action", body = Object),
        (status = 404, description = "Agent not found", body = ErrorResponse),
        (status = 409, description = "Action already in flight", body = ErrorResponse),
        (status = 410, description = "Previous plan expired; agent reset", body = ErrorResponse)
    )
)]
pub async fn plan_action(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(req): Json<PlanRequest>,
) -> impl IntoResponse {
    let timeout = req.timeout_ms.map(Duration::from_millis);
    match state.coordinator.plan(&agent_id, req.perception, timeout).await {
        Ok(proposal) => Json(proposal).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Commit the outcome of the agent's pending action.
#[utoipa::path(
    post,
    path = "/agents/{id}/confirm",
    tag = "plans",
    params(
        ("id" = String, Path, description = "Agent id")
    ),
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "Outcome committed", body = Object),
        (status = 400, description = "Invalid salience or room", body = ErrorResponse),
        (status = 404, description = "Agent not found", body = ErrorResponse),
        (status = 409, description = "Stale confirmation", body = ErrorResponse),
        (status = 410, description = "Plan expired", body = ErrorResponse)
    )
)]
pub async fn confirm_action(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> impl IntoResponse {
    match state.coordinator.confirm(&agent_id, req.into_outcome()).await {
        Ok(ack) => Json(ack).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Plan several agents concurrently.
#[utoipa::path(
    post,
    path = "/tick/plan",
    tag = "plans",
    request_body = TickPlanRequest,
    responses(
        (status = 200, description = "One proposal per agent, in request order", body = Object)
    )
)]
pub async fn plan_tick(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TickPlanRequest>,
) -> impl IntoResponse {
    let timeout = req.timeout_ms.map(Duration::from_millis);
    let batch = req
        .agents
        .into_iter()
        .map(|entry| (entry.agent_id, entry.perception))
        .collect();
    let proposals = state.coordinator.plan_batch(batch, timeout).await;

    Json(serde_json::json!({ "proposals": proposals }))
}

/// Reset agents whose pending action outlived the timeout.
#[utoipa::path(
    post,
    path = "/plans/expire",
    tag = "plans",
    responses(
        (status = 200, description = "Expired plans", body = Object)
    )
)]
pub async fn expire_plans(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let expired = state.coordinator.expire_stale_plans();
    Json(serde_json::json!({ "expired": expired }))
}
