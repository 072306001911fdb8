//! The external decision function and the data it exchanges.
//!
//! The engine never chooses actions itself. A [`DecisionMaker`] receives a
//! [`DecisionRequest`] (perception plus memory and position context) and
//! returns one [`AgentAction`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::memory::MemoryEvent;
use crate::retry::{retry_async, RetryPolicy};
use crate::spatial::{AgentPosition, Neighbor, Tile};

/// What an agent decided to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    /// Walk to a tile.
    Move {
        /// Destination.
        to: Tile,
    },
    /// Speak, optionally to someone.
    Say {
        /// Addressee; `None` speaks to the room.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        /// What is said.
        message: String,
    },
    /// Use an object or entity.
    Interact {
        /// Entity acted upon.
        target: String,
        /// What is done to it.
        verb: String,
    },
    /// Do nothing this tick. Also the fallback action.
    Observe,
}

impl AgentAction {
    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Say { .. } => "say",
            Self::Interact { .. } => "interact",
            Self::Observe => "observe",
        }
    }
}

/// Something the agent can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleEntity {
    /// Entity id.
    pub id: String,
    /// Entity kind, e.g. "agent" or "lamp".
    pub kind: String,
    /// Where it is.
    pub tile: Tile,
}

/// A message the agent received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceivedMessage {
    /// Sender id.
    pub from: String,
    /// Message body.
    pub text: String,
}

/// What an agent perceives at the start of a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perception {
    /// Simulation time.
    pub timestamp: i64,
    /// Tile the caller believes the agent is on.
    #[serde(default)]
    pub tile: Option<Tile>,
    /// Entities in view.
    #[serde(default)]
    pub visible_entities: Vec<VisibleEntity>,
    /// Messages received since the last tick.
    #[serde(default)]
    pub messages: Vec<PerceivedMessage>,
    /// Free-text hint used to pick relevant memories.
    #[serde(default)]
    pub focus: Option<String>,
}

impl Perception {
    /// Empty perception at `timestamp`.
    #[must_use]
    pub fn at(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Sets the focus hint.
    #[must_use]
    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = Some(focus.into());
        self
    }

    /// Text used to look up relevant memories: focus, messages and the
    /// ids and kinds of visible entities.
    #[must_use]
    pub fn memory_context(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(focus) = &self.focus {
            parts.push(focus);
        }
        parts.extend(self.messages.iter().map(|m| m.text.as_str()));
        for entity in &self.visible_entities {
            parts.push(&entity.id);
            parts.push(&entity.kind);
        }
        parts.join(" ")
    }
}

/// Input to the decision function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Agent being planned.
    pub agent_id: String,
    /// Perception, passed through unmodified.
    pub perception: Perception,
    /// Relevant memories, best first.
    pub memories: Vec<MemoryEvent>,
    /// Current position.
    pub position: AgentPosition,
    /// Occupants near the agent.
    #[serde(default)]
    pub nearby: Vec<Neighbor>,
}

/// Failure reported by a decision backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    /// The backend could not be reached or timed out.
    #[error("decision backend unavailable: {0}")]
    Unavailable(String),
    /// The backend answered with something that is not an action.
    #[error("invalid decision response: {0}")]
    InvalidResponse(String),
    /// The backend refused the request.
    #[error("decision rejected: {0}")]
    Rejected(String),
}

impl DecisionError {
    /// Only transport-level failures are worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// The external decision function.
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    /// Chooses one action for the agent.
    async fn decide(&self, request: &DecisionRequest) -> Result<AgentAction, DecisionError>;
}

#[async_trait]
impl<T: DecisionMaker + ?Sized> DecisionMaker for Arc<T> {
    async fn decide(&self, request: &DecisionRequest) -> Result<AgentAction, DecisionError> {
        (**self).decide(request).await
    }
}

/// Decider that always observes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObserveDecider;

#[async_trait]
impl DecisionMaker for ObserveDecider {
    async fn decide(&self, _request: &DecisionRequest) -> Result<AgentAction, DecisionError> {
        Ok(AgentAction::Observe)
    }
}

/// Wraps a decider with bounded retry on retryable errors.
#[derive(Debug, Clone)]
pub struct RetryingDecider<D> {
    inner: D,
    policy: RetryPolicy,
}

impl<D: DecisionMaker> RetryingDecider<D> {
    /// Wraps `inner`.
    pub fn new(inner: D, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped decider.
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: DecisionMaker> DecisionMaker for RetryingDecider<D> {
    async fn decide(&self, request: &DecisionRequest) -> Result<AgentAction, DecisionError> {
        retry_async(
            &self.policy,
            "decide",
            DecisionError::is_retryable,
            || self.inner.decide(request),
        )
        .await
    }
}
