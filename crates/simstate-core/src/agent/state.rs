//! Per-agent state: memory, position and the pending-action slot.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::decision::AgentAction;
use crate::memory::{EpisodicMemory, MemorySnapshot, RetentionPolicy};
use crate::spatial::{AgentPosition, PositionTracker, SpatialWorld, Tile};

/// Identifier matching a `Confirm` to its `Plan`.
pub type PlanId = Uuid;

/// Lifecycle of a pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    /// Proposed and awaiting confirmation.
    Planned,
    /// Confirmed; terminal, discarded right after.
    Confirmed,
}

/// An action proposed by `Plan` and not yet confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    /// Owning agent.
    pub agent_id: String,
    /// Plan id handed to the caller.
    pub plan_id: PlanId,
    /// What the decision function proposed.
    pub action: AgentAction,
    /// When the plan was stored.
    pub issued_at: Instant,
    /// Lifecycle state.
    pub state: PendingState,
}

/// Where an agent is in the plan/confirm cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Ready to plan.
    Idle,
    /// Waiting on the decision function.
    Planning,
    /// A proposal is waiting for confirmation.
    AwaitingConfirmation,
}

impl AgentStatus {
    /// Snake-case label, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

#[derive(Debug)]
pub(crate) enum Phase {
    Idle,
    /// `ticket` identifies the `Plan` call that owns this phase.
    Planning { ticket: u64 },
    AwaitingConfirmation(PendingAction),
}

/// Serializable form of an agent: memory log plus last known position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Agent id.
    pub agent_id: String,
    /// Last known position.
    pub position: AgentPosition,
    /// Memory log.
    pub memory: MemorySnapshot,
}

/// Everything one agent owns. Only ever touched under the agent's lock.
#[derive(Debug)]
pub struct AgentState {
    agent_id: String,
    memory: EpisodicMemory,
    tracker: PositionTracker,
    pub(crate) phase: Phase,
}

impl AgentState {
    /// New agent at `tile` with an empty memory.
    pub fn new(
        agent_id: impl Into<String>,
        tile: Tile,
        at: i64,
        memory: EpisodicMemory,
        world: Arc<SpatialWorld>,
    ) -> Self {
        let agent_id = agent_id.into();
        let tracker = PositionTracker::new(agent_id.clone(), tile, at, world);
        Self {
            agent_id,
            memory,
            tracker,
            phase: Phase::Idle,
        }
    }

    /// Rebuilds an agent from a snapshot. The room is re-derived from the
    /// tile and memory is trimmed to `capacity`.
    pub fn from_snapshot(
        snapshot: AgentSnapshot,
        capacity: usize,
        policy: RetentionPolicy,
        world: Arc<SpatialWorld>,
    ) -> Self {
        let mut memory = EpisodicMemory::new(capacity, policy);
        memory.restore(snapshot.memory);
        Self::new(
            snapshot.agent_id,
            snapshot.position.tile,
            snapshot.position.updated_at,
            memory,
            world,
        )
    }

    /// Agent id.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Memory store.
    #[must_use]
    pub fn memory(&self) -> &EpisodicMemory {
        &self.memory
    }

    /// Mutable memory store.
    pub fn memory_mut(&mut self) -> &mut EpisodicMemory {
        &mut self.memory
    }

    /// Position tracker.
    #[must_use]
    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    /// Mutable position tracker.
    pub fn tracker_mut(&mut self) -> &mut PositionTracker {
        &mut self.tracker
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> &AgentPosition {
        self.tracker.position()
    }

    /// Current plan/confirm status.
    #[must_use]
    pub fn status(&self) -> AgentStatus {
        match self.phase {
            Phase::Idle => AgentStatus::Idle,
            Phase::Planning { .. } => AgentStatus::Planning,
            Phase::AwaitingConfirmation(_) => AgentStatus::AwaitingConfirmation,
        }
    }

    /// The open pending action, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingAction> {
        match &self.phase {
            Phase::AwaitingConfirmation(pending) => Some(pending),
            _ => None,
        }
    }

    /// Copies memory and position into a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.agent_id.clone(),
            position: self.tracker.position().clone(),
            memory: self.memory.snapshot(),
        }
    }

    /// Drops the agent's footprint in shared structures.
    pub(crate) fn release(&mut self) {
        self.tracker.release();
        self.phase = Phase::Idle;
    }
}
