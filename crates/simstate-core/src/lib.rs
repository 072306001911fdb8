//! # `SimState` Core
//!
//! Agent state and memory engine for multi-agent simulations driven by an
//! external decision function (typically an LLM).
//!
//! ## Features
//!
//! - **TTL LRU Cache**: bounded, O(1) get/put with lazy per-entry expiry
//! - **Episodic Memory**: salience/context/recency indexed event log with retention
//! - **Spatial Tracking**: tile positions, room table, coarse-cell occupancy hash
//! - **Plan / Confirm**: side-effect-free planning, single-commit confirmation
//! - **Persistence**: pluggable snapshot store (in memory, JSON files)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use simstate_core::{ActionOutcome, Coordinator, ObserveDecider, Perception, SimConfig, Tile};
//!
//! let coordinator = Coordinator::builder(SimConfig::load()?, Arc::new(ObserveDecider)).build()?;
//! coordinator.register_agent("a1", Tile::new(10, 10), 0)?;
//!
//! // Propose (no side effects)
//! let proposal = coordinator.plan("a1", Perception::at(3), None).await?;
//!
//! // Execute in the game, then commit what happened
//! if let Some(plan_id) = proposal.plan_id {
//!     let outcome = ActionOutcome::new(plan_id, 4, "moved to (12,10), saw a lamp", 4)
//!         .moved_to(Tile::new(12, 10));
//!     coordinator.confirm("a1", outcome).await?;
//! }
//!
//! let lamps = coordinator.relevant_memories("a1", "lamp", 5, 1)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::significant_drop_in_scrutinee)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::manual_let_else)]

pub mod agent;
pub mod cache;
pub mod clock;
pub mod config;
#[cfg(test)]
mod config_tests;
pub mod coordinator;
pub mod decision;
pub mod error;
#[cfg(test)]
mod error_tests;
pub mod memory;
pub mod persistence;
pub mod retry;
pub mod spatial;

pub use agent::{AgentSnapshot, AgentStatus, PendingAction, PendingState, PlanId};
pub use cache::{CacheStats, TtlLruCache};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{
    CacheConfig, ConfigError, CoordinatorConfig, LoggingConfig, MemoryConfig, PersistenceBackend,
    PersistenceConfig, ServerConfig, SimConfig, SpatialConfig,
};
pub use coordinator::{
    ActionOutcome, BatchConfirmResult, ConfirmAck, Coordinator, CoordinatorBuilder, ExpiredPlan,
    PersistenceStatus, Proposal,
};
pub use decision::{
    AgentAction, DecisionError, DecisionMaker, DecisionRequest, ObserveDecider, PerceivedMessage,
    Perception, RetryingDecider, VisibleEntity,
};
pub use error::{Error, Result};
pub use memory::{EpisodicMemory, EventId, MemoryEvent, NewEvent, RetentionPolicy, Salience};
pub use persistence::{InMemoryStore, JsonFileStore, StateStore};
pub use retry::RetryPolicy;
pub use spatial::{
    AgentPosition, DistanceMetric, Neighbor, OccupantKind, RoomDef, RoomShape, RoomTable,
    SpatialWorld, Tile,
};
