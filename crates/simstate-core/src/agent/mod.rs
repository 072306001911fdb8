//! Agent state aggregation.
//!
//! An [`AgentState`] bundles one memory store, one position tracker and one
//! pending-action slot. Agents live in an [`AgentRegistry`] and are only
//! mutated under their own lock.

mod registry;
mod state;

pub use registry::{AgentHandle, AgentRegistry};
pub use state::{
    AgentSnapshot, AgentState, AgentStatus, PendingAction, PendingState, PlanId,
};
pub(crate) use state::Phase;

#[cfg(test)]
mod agent_tests;
