//! Error types for `SimState`.
//!
//! One error type covers every engine operation. Each variant carries a
//! stable `SIM-XXX` code so that adapters (HTTP, logs) can surface it
//! without string matching.

use thiserror::Error;

use crate::memory::EventId;

/// Result type alias for `SimState` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `SimState` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Salience outside `[1, 10]` (SIM-001).
    #[error("[SIM-001] Invalid salience {0}: must be within [1, 10]")]
    InvalidSalience(i64),

    /// Memory event not found (SIM-002).
    #[error("[SIM-002] Memory event {0} not found")]
    EventNotFound(EventId),

    /// A planned action is still awaiting confirmation (SIM-003).
    #[error("[SIM-003] Agent '{agent_id}' already has action {plan_id} in flight")]
    ActionInFlight {
        /// Agent that tried to plan twice.
        agent_id: String,
        /// Plan that is still open.
        plan_id: String,
    },

    /// Confirmation with no matching pending action (SIM-004).
    #[error("[SIM-004] Stale confirmation for agent '{agent_id}': {reason}")]
    StaleConfirmation {
        /// Agent the confirmation was addressed to.
        agent_id: String,
        /// Why the confirmation did not match.
        reason: String,
    },

    /// The pending action outlived the configured timeout (SIM-005).
    #[error("[SIM-005] Plan {plan_id} for agent '{agent_id}' expired before confirmation")]
    PlanExpired {
        /// Agent whose plan expired.
        agent_id: String,
        /// Plan that expired.
        plan_id: String,
    },

    /// The decision function exceeded its deadline (SIM-006).
    #[error("[SIM-006] Decision for agent '{agent_id}' timed out after {timeout_ms} ms")]
    DecisionTimeout {
        /// Agent being planned.
        agent_id: String,
        /// Deadline that was exceeded.
        timeout_ms: u64,
    },

    /// Agent is not registered (SIM-007).
    #[error("[SIM-007] Agent '{0}' not found")]
    AgentNotFound(String),

    /// Agent is already registered (SIM-008).
    #[error("[SIM-008] Agent '{0}' already exists")]
    AgentExists(String),

    /// An explicit room disagrees with the room table (SIM-009).
    #[error("[SIM-009] Tile ({x}, {y}) resolves to {derived:?}, not {given:?}")]
    RoomMismatch {
        /// Tile x coordinate.
        x: i32,
        /// Tile y coordinate.
        y: i32,
        /// Room supplied by the caller.
        given: String,
        /// Room derived from the room table.
        derived: Option<String>,
    },

    /// Planning was cancelled before a proposal was stored (SIM-010).
    #[error("[SIM-010] Plan for agent '{0}' was cancelled")]
    PlanCancelled(String),

    /// The decision function reported a failure (SIM-011).
    #[error("[SIM-011] Decision failed: {0}")]
    Decision(String),

    /// Persistence backend failure (SIM-012).
    #[error("[SIM-012] Storage error: {0}")]
    Storage(String),

    /// Snapshot (de)serialization failure (SIM-013).
    #[error("[SIM-013] Serialization error: {0}")]
    Serialization(String),

    /// IO error (SIM-014).
    #[error("[SIM-014] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error (SIM-015).
    #[error("[SIM-015] Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the error code (e.g., "SIM-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSalience(_) => "SIM-001",
            Self::EventNotFound(_) => "SIM-002",
            Self::ActionInFlight { .. } => "SIM-003",
            Self::StaleConfirmation { .. } => "SIM-004",
            Self::PlanExpired { .. } => "SIM-005",
            Self::DecisionTimeout { .. } => "SIM-006",
            Self::AgentNotFound(_) => "SIM-007",
            Self::AgentExists(_) => "SIM-008",
            Self::RoomMismatch { .. } => "SIM-009",
            Self::PlanCancelled(_) => "SIM-010",
            Self::Decision(_) => "SIM-011",
            Self::Storage(_) => "SIM-012",
            Self::Serialization(_) => "SIM-013",
            Self::Io(_) => "SIM-014",
            Self::Config(_) => "SIM-015",
        }
    }

    /// Returns true for protocol warnings.
    ///
    /// The state machine guarantees no corruption for these, so callers
    /// should log and move on rather than abort.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::ActionInFlight { .. } | Self::StaleConfirmation { .. }
        )
    }

    /// Returns true if retrying the operation later can succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidSalience(_) | Self::RoomMismatch { .. } | Self::Config(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
