//! Inputs and outputs of the plan/confirm protocol.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::agent::PlanId;
use crate::decision::AgentAction;
use crate::error::Result;
use crate::memory::EventId;
use crate::spatial::{AgentPosition, Tile};

/// What `Plan` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Agent the proposal is for.
    pub agent_id: String,
    /// Id to echo in `Confirm`. `None` for degraded proposals, which need
    /// no confirmation.
    pub plan_id: Option<PlanId>,
    /// Proposed action.
    pub action: AgentAction,
    /// True when the decision function failed or timed out and the action
    /// is the fallback.
    pub degraded: bool,
    /// Why the proposal is degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Proposal {
    /// Fallback `Observe` proposal.
    pub(crate) fn fallback(agent_id: &str, reason: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            plan_id: None,
            action: AgentAction::Observe,
            degraded: true,
            reason: Some(reason.into()),
        }
    }
}

/// What actually happened when the caller executed a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Plan being confirmed.
    pub plan_id: PlanId,
    /// Simulation time of the outcome.
    pub timestamp: i64,
    /// Text of the memory event to record.
    pub description: String,
    /// Salience of the memory event, 1 to 10.
    pub salience: i64,
    /// Tags of the memory event.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Event location; defaults to the agent's room, or "unknown".
    #[serde(default)]
    pub location: Option<String>,
    /// Tile the agent ended up on, if it moved.
    #[serde(default)]
    pub new_tile: Option<Tile>,
    /// Room the caller believes `new_tile` is in; checked, never trusted.
    #[serde(default)]
    pub room: Option<String>,
}

impl ActionOutcome {
    /// Outcome with no move and no tags.
    pub fn new(plan_id: PlanId, timestamp: i64, description: impl Into<String>, salience: i64) -> Self {
        Self {
            plan_id,
            timestamp,
            description: description.into(),
            salience,
            tags: BTreeSet::new(),
            location: None,
            new_tile: None,
            room: None,
        }
    }

    /// Records a move.
    #[must_use]
    pub fn moved_to(mut self, tile: Tile) -> Self {
        self.new_tile = Some(tile);
        self
    }

    /// Adds tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Whether the confirmed state reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceStatus {
    /// Snapshot saved.
    Saved,
    /// No store configured or persistence disabled.
    Skipped,
    /// The store failed; in-memory state is committed regardless.
    Failed,
}

/// Result of a successful `Confirm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmAck {
    /// Agent confirmed.
    pub agent_id: String,
    /// Plan confirmed.
    pub plan_id: PlanId,
    /// Action that was confirmed.
    pub action: AgentAction,
    /// Memory event recorded for the outcome.
    pub event_id: EventId,
    /// Position after the commit.
    pub position: AgentPosition,
    /// Whether the position changed.
    pub moved: bool,
    /// Persistence result.
    pub persistence: PersistenceStatus,
    /// Store error when `persistence` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
}

/// A plan dropped by `expire_stale_plans`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiredPlan {
    /// Agent whose plan expired.
    pub agent_id: String,
    /// The expired plan.
    pub plan_id: PlanId,
}

/// One entry of a `confirm_batch` result.
#[derive(Debug)]
pub struct BatchConfirmResult {
    /// Agent confirmed.
    pub agent_id: String,
    /// Outcome for that agent.
    pub result: Result<ConfirmAck>,
}
