//! Explicit `agentId -> AgentState` registry.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use super::state::AgentState;
use crate::error::{Error, Result};

/// Handle to one agent's state.
pub type AgentHandle = Arc<Mutex<AgentState>>;

/// Sharded map of agents. Each agent has its own lock, so work on
/// different agents never contends here beyond the shard lookup.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: DashMap<String, AgentHandle>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the agent built by `make`.
    ///
    /// `make` only runs when the id is free, so a rejected registration
    /// leaves no trace in shared structures.
    ///
    /// # Errors
    ///
    /// [`Error::AgentExists`] if the id is taken.
    pub fn insert_with<F>(&self, agent_id: &str, make: F) -> Result<AgentHandle>
    where
        F: FnOnce() -> AgentState,
    {
        match self.agents.entry(agent_id.to_string()) {
            Entry::Occupied(entry) => Err(Error::AgentExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let handle = Arc::new(Mutex::new(make()));
                entry.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    /// Looks up an agent.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn get(&self, agent_id: &str) -> Result<AgentHandle> {
        self.agents
            .get(agent_id)
            .map(|handle| Arc::clone(&handle))
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))
    }

    /// Removes an agent and returns its handle.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn remove(&self, agent_id: &str) -> Result<AgentHandle> {
        self.agents
            .remove(agent_id)
            .map(|(_, handle)| handle)
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))
    }

    /// True if the id is registered.
    #[must_use]
    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.iter().map(|e| e.key().clone()).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// True when no agents are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
