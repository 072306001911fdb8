//! HTTP handlers for the SimState REST API.
//!
//! - `health`: health check and OpenAPI document
//! - `agents`: registration, removal, listing
//! - `plans`: plan, confirm, batch tick, expiry sweep
//! - `queries`: memories, position, nearby

pub mod agents;
pub mod health;
pub mod plans;
pub mod queries;

pub use agents::{list_agents, register_agent, remove_agent};
pub use health::{health_check, openapi_json};
pub use plans::{confirm_action, expire_plans, plan_action, plan_tick};
pub use queries::{get_memories, get_nearby, get_position};

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use simstate_core::Error;

use crate::types::ErrorResponse;

/// HTTP status for an engine error.
pub(crate) fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::AgentNotFound(_) | Error::EventNotFound(_) => StatusCode::NOT_FOUND,
        Error::AgentExists(_)
        | Error::ActionInFlight { .. }
        | Error::StaleConfirmation { .. }
        | Error::PlanCancelled(_) => StatusCode::CONFLICT,
        Error::PlanExpired { .. } => StatusCode::GONE,
        Error::InvalidSalience(_) | Error::RoomMismatch { .. } | Error::Config(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::DecisionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::Decision(_) => StatusCode::BAD_GATEWAY,
        Error::Storage(_) | Error::Serialization(_) | Error::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Converts an engine error into a JSON error response.
pub(crate) fn error_response(err: &Error) -> Response {
    (
        status_for(err),
        Json(ErrorResponse {
            error: err.to_string(),
            code: Some(err.code().to_string()),
        }),
    )
        .into_response()
}
