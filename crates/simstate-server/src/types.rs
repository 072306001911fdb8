//! Request/Response types for the SimState REST API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;
use uuid::Uuid;

use simstate_core::{ActionOutcome, AgentPosition, Perception, Tile};

// ============================================================================
// Agent Types
// ============================================================================

/// Request to register an agent.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterAgentRequest {
    /// Agent id.
    #[schema(example = "a1")]
    pub agent_id: String,
    /// Starting tile x.
    #[schema(example = 10)]
    pub x: i32,
    /// Starting tile y.
    #[schema(example = 10)]
    pub y: i32,
    /// Simulation time of registration.
    #[serde(default)]
    pub timestamp: i64,
}

/// Position of an agent.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PositionResponse {
    /// Agent id.
    pub agent_id: String,
    /// Tile x.
    pub x: i32,
    /// Tile y.
    pub y: i32,
    /// Room containing the tile, if any.
    pub room: Option<String>,
    /// Simulation time of the last move.
    pub updated_at: i64,
}

impl PositionResponse {
    /// Flattens a core position.
    pub fn new(agent_id: &str, position: AgentPosition) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            x: position.tile.x,
            y: position.tile.y,
            room: position.room,
            updated_at: position.updated_at,
        }
    }
}

/// Summary of an agent.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentSummary {
    /// Agent id.
    pub agent_id: String,
    /// `idle`, `planning` or `awaiting_confirmation`.
    pub status: String,
    /// Current position.
    pub position: PositionResponse,
}

/// Registered agents.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListAgentsResponse {
    /// Agents sorted by id.
    pub agents: Vec<AgentSummary>,
}

// ============================================================================
// Plan / Confirm Types
// ============================================================================

/// Request to plan an agent's next action.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlanRequest {
    /// What the agent perceives (timestamp, tile, visible entities, messages, focus).
    #[schema(value_type = Object)]
    pub perception: Perception,
    /// Decision deadline override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// One entry of a batch plan request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TickPlanEntry {
    /// Agent to plan.
    pub agent_id: String,
    /// Its perception.
    #[schema(value_type = Object)]
    pub perception: Perception,
}

/// Request to plan several agents in one tick.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TickPlanRequest {
    /// Agents and perceptions.
    pub agents: Vec<TickPlanEntry>,
    /// Decision deadline override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Request to confirm the outcome of a planned action.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    /// Plan id returned by `plan`.
    pub plan_id: Uuid,
    /// Simulation time of the outcome.
    pub timestamp: i64,
    /// What happened; stored as a memory.
    #[schema(example = "moved to (12,10), saw a lamp")]
    pub description: String,
    /// Salience of the memory, 1 to 10.
    #[schema(example = 4)]
    pub salience: i64,
    /// Memory tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Memory location; defaults to the agent's room.
    #[serde(default)]
    pub location: Option<String>,
    /// New tile x, if the agent moved.
    #[serde(default)]
    pub x: Option<i32>,
    /// New tile y, if the agent moved.
    #[serde(default)]
    pub y: Option<i32>,
    /// Room the caller believes the new tile is in.
    #[serde(default)]
    pub room: Option<String>,
}

impl ConfirmRequest {
    /// Converts to a core outcome. A move needs both coordinates.
    pub fn into_outcome(self) -> ActionOutcome {
        let mut outcome = ActionOutcome::new(self.plan_id, self.timestamp, self.description, self.salience)
            .with_tags(self.tags);
        outcome.location = self.location;
        outcome.room = self.room;
        if let (Some(x), Some(y)) = (self.x, self.y) {
            outcome = outcome.moved_to(Tile::new(x, y));
        }
        outcome
    }
}

// ============================================================================
// Query Types
// ============================================================================

/// Query string of the memories endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MemoriesQuery {
    /// Context text; empty returns the most salient memories.
    #[serde(default)]
    pub context: String,
    /// Maximum results.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum salience, 1 to 10.
    #[serde(default = "default_min_salience")]
    pub min_salience: i64,
}

fn default_limit() -> usize {
    10
}

fn default_min_salience() -> i64 {
    1
}

/// A memory event.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemoryResponse {
    /// Event id.
    pub id: u64,
    /// Simulation time.
    pub timestamp: i64,
    /// Location.
    pub location: String,
    /// Description.
    pub description: String,
    /// Salience.
    pub salience: u8,
    /// Tags.
    pub tags: Vec<String>,
}

/// Memories, best first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemoriesResponse {
    /// Matching events.
    pub memories: Vec<MemoryResponse>,
}

/// Query string of the nearby endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NearbyQuery {
    /// Search radius in tiles.
    #[serde(default = "default_radius")]
    pub radius: u32,
}

fn default_radius() -> u32 {
    5
}

/// Something near an agent.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NeighborResponse {
    /// Occupant id.
    pub id: String,
    /// `agent` or `point_of_interest`.
    pub kind: String,
    /// Tile x.
    pub x: i32,
    /// Tile y.
    pub y: i32,
    /// Distance from the agent.
    pub distance: i64,
}

/// Occupants near an agent, nearest first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NearbyResponse {
    /// Neighbors.
    pub nearby: Vec<NeighborResponse>,
}

// ============================================================================
// Error Types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Stable error code (`SIM-XXX`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
