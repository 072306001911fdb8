//! Read-only agent queries.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use simstate_core::OccupantKind;

use super::error_response;
use crate::types::{
    ErrorResponse, MemoriesQuery, MemoriesResponse, MemoryResponse, NearbyQuery, NearbyResponse,
    NeighborResponse, PositionResponse,
};
use crate::AppState;

/// Memories relevant to a context, best first.
#[utoipa::path(
    get,
    path = "/agents/{id}/memories",
    tag = "queries",
    params(
        ("id" = String, Path, description = "Agent id"),
        ("context" = Option<String>, Query, description = "Context text"),
        ("limit" = Option<usize>, Query, description = "Maximum results (default 10)"),
        ("min_salience" = Option<i64>, Query, description = "Minimum salience (default 1)")
    ),
    responses(
        (status = 200, description = "Relevant memories", body = MemoriesResponse),
        (status = 400, description = "Invalid salience", body = ErrorResponse),
        (status = 404, description = "Agent not found", body = ErrorResponse)
    )
)]
pub async fn get_memories(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<MemoriesQuery>,
) -> impl IntoResponse {
    match state.coordinator.relevant_memories(
        &agent_id,
        &query.context,
        query.limit,
        query.min_salience,
    ) {
        Ok(events) => Json(MemoriesResponse {
            memories: events
                .into_iter()
                .map(|event| MemoryResponse {
                    id: event.id(),
                    timestamp: event.timestamp(),
                    location: event.location().to_string(),
                    description: event.description().to_string(),
                    salience: event.salience().get(),
                    tags: event.tags().iter().cloned().collect(),
                })
                .collect(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Current position of an agent.
#[utoipa::path(
    get,
    path = "/agents/{id}/position",
    tag = "queries",
    params(
        ("id" = String, Path, description = "Agent id")
    ),
    responses(
        (status = 200, description = "Position", body = PositionResponse),
        (status = 404, description = "Agent not found", body = ErrorResponse)
    )
)]
pub async fn get_position(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> impl IntoResponse {
    match state.coordinator.position(&agent_id) {
        Ok(position) => Json(PositionResponse::new(&agent_id, position)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Occupants within a radius of an agent.
#[utoipa::path(
    get,
    path = "/agents/{id}/nearby",
    tag = "queries",
    params(
        ("id" = String, Path, description = "Agent id"),
        ("radius" = Option<u32>, Query, description = "Radius in tiles (default 5)")
    ),
    responses(
        (status = 200, description = "Neighbors, nearest first", body = NearbyResponse),
        (status = 404, description = "Agent not found", body = ErrorResponse)
    )
)]
pub async fn get_nearby(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<NearbyQuery>,
) -> impl IntoResponse {
    match state.coordinator.nearby(&agent_id, query.radius) {
        Ok(neighbors) => Json(NearbyResponse {
            nearby: neighbors
                .into_iter()
                .map(|n| NeighborResponse {
                    kind: match n.kind {
                        OccupantKind::Agent => "agent",
                        OccupantKind::PointOfInterest => "point_of_interest",
                    }
                    .to_string(),
                    x: n.tile.x,
                    y: n.tile.y,
                    distance: n.distance,
                    id: n.id,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}
