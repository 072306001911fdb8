//! Two-phase (plan/confirm) action coordinator.
//!
//! Each agent cycles `Idle -> Planning -> AwaitingConfirmation -> Idle`.
//! `Plan` asks the decision function for an action and stores it as the
//! agent's single pending action without touching memory or position.
//! `Confirm` commits exactly one memory event and at most one position
//! update for that pending action.
//!
//! Agent locks are never held across an `.await`: `Plan` gathers its
//! context under the lock, releases it while the decision function runs,
//! then re-locks and checks that it still owns the `Planning` phase.

mod types;

pub use types::{
    ActionOutcome, BatchConfirmResult, ConfirmAck, ExpiredPlan, PersistenceStatus, Proposal,
};

use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{
    AgentHandle, AgentRegistry, AgentSnapshot, AgentState, AgentStatus, PendingAction,
    PendingState, Phase,
};
use crate::clock::{system_clock, SharedClock};
use crate::config::{CoordinatorConfig, MemoryConfig, SimConfig};
use crate::decision::{DecisionMaker, DecisionRequest, Perception, RetryingDecider};
use crate::error::{Error, Result};
use crate::memory::{EpisodicMemory, MemoryEvent, NewEvent, Salience};
use crate::persistence::StateStore;
use crate::retry::{retry_async, RetryPolicy};
use crate::spatial::{AgentPosition, Neighbor, ProximityCache, RoomTable, SpatialWorld, Tile};

/// Builds a [`Coordinator`] from configuration and collaborators.
pub struct CoordinatorBuilder {
    config: SimConfig,
    decider: Arc<dyn DecisionMaker>,
    store: Option<Arc<dyn StateStore>>,
    clock: SharedClock,
}

impl CoordinatorBuilder {
    /// Starts a builder around `decider`.
    pub fn new(config: SimConfig, decider: Arc<dyn DecisionMaker>) -> Self {
        Self {
            config,
            decider,
            store: None,
            clock: system_clock(),
        }
    }

    /// Persists agent snapshots to `store`.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Reads time from `clock` (cache TTL and pending expiry).
    #[must_use]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Validates the configuration and builds the coordinator.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the configuration or room table is invalid.
    pub fn build(self) -> Result<Coordinator> {
        self.config.validate()?;
        let spatial = &self.config.spatial;

        let rooms = RoomTable::new(spatial.rooms.clone(), spatial.room_cell_size)?;
        let cache = Arc::new(ProximityCache::with_clock(
            self.config.cache.capacity,
            Arc::clone(&self.clock),
        ));
        let world = SpatialWorld::new(rooms)
            .with_metric(spatial.metric)
            .with_occupancy_cell_size(spatial.occupancy_cell_size)
            .with_max_movement(spatial.max_movement)
            .with_proximity_cache(cache, self.config.cache.proximity_ttl());

        let decider: Arc<dyn DecisionMaker> = if self.config.coordinator.decision_retries > 0 {
            Arc::new(RetryingDecider::new(
                self.decider,
                self.config.coordinator.retry(),
            ))
        } else {
            self.decider
        };

        Ok(Coordinator {
            registry: AgentRegistry::new(),
            world: Arc::new(world),
            decider,
            store: self.store,
            clock: self.clock,
            save_retry: self.config.persistence.retry(),
            settings: self.config.coordinator,
            memory: self.config.memory,
            perception_radius: spatial.perception_radius,
            tickets: AtomicU64::new(1),
        })
    }
}

/// Drives every registered agent through plan/confirm.
pub struct Coordinator {
    registry: AgentRegistry,
    world: Arc<SpatialWorld>,
    decider: Arc<dyn DecisionMaker>,
    store: Option<Arc<dyn StateStore>>,
    clock: SharedClock,
    save_retry: RetryPolicy,
    settings: CoordinatorConfig,
    memory: MemoryConfig,
    perception_radius: u32,
    tickets: AtomicU64,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("agents", &self.registry.len())
            .field("persistent", &self.store.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Resets the agent to `Idle` if the owning `Plan` future is dropped while
/// the decision function is running.
struct PlanGuard<'a> {
    handle: &'a AgentHandle,
    ticket: u64,
    armed: bool,
}

impl PlanGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PlanGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.handle.lock();
        if matches!(state.phase, Phase::Planning { ticket } if ticket == self.ticket) {
            state.phase = Phase::Idle;
            warn!(agent_id = state.agent_id(), "plan dropped mid-decision, agent reset to idle");
        }
    }
}

impl Coordinator {
    /// Shortcut for [`CoordinatorBuilder::new`].
    pub fn builder(config: SimConfig, decider: Arc<dyn DecisionMaker>) -> CoordinatorBuilder {
        CoordinatorBuilder::new(config, decider)
    }

    /// Shared spatial world (room table, occupancy, proximity cache).
    #[must_use]
    pub fn world(&self) -> &Arc<SpatialWorld> {
        &self.world
    }

    /// Coordinator settings.
    #[must_use]
    pub fn settings(&self) -> &CoordinatorConfig {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Adds a new agent at `tile`.
    ///
    /// # Errors
    ///
    /// [`Error::AgentExists`] if the id is taken.
    pub fn register_agent(&self, agent_id: &str, tile: Tile, at: i64) -> Result<AgentPosition> {
        if agent_id.trim().is_empty() {
            return Err(Error::Config("agent id must not be empty".to_string()));
        }
        let handle = self.registry.insert_with(agent_id, || {
            AgentState::new(agent_id, tile, at, self.new_memory(), Arc::clone(&self.world))
        })?;
        let position = handle.lock().position().clone();
        info!(agent_id, x = tile.x, y = tile.y, room = ?position.room, "agent registered");
        Ok(position)
    }

    /// Rehydrates an agent from the state store.
    ///
    /// # Errors
    ///
    /// [`Error::AgentExists`] if it is already live, [`Error::AgentNotFound`]
    /// if the store has no snapshot, [`Error::Storage`] without a store.
    pub async fn load_agent(&self, agent_id: &str) -> Result<AgentPosition> {
        if self.registry.contains(agent_id) {
            return Err(Error::AgentExists(agent_id.to_string()));
        }
        let store = self.require_store()?;
        let snapshot = store
            .load(agent_id)
            .await?
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))?;
        let events = snapshot.memory.events.len();

        let handle = self.registry.insert_with(agent_id, || {
            AgentState::from_snapshot(
                snapshot,
                self.memory.capacity,
                self.memory.retention,
                Arc::clone(&self.world),
            )
        })?;
        let position = handle.lock().position().clone();
        info!(agent_id, events, "agent loaded from store");
        Ok(position)
    }

    /// Rehydrates every stored agent that is not already live.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be listed or a snapshot cannot be read.
    pub async fn load_all(&self) -> Result<usize> {
        let store = self.require_store()?;
        let mut loaded = 0;
        for agent_id in store.list().await? {
            if self.registry.contains(&agent_id) {
                continue;
            }
            self.load_agent(&agent_id).await?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Saves an agent's snapshot now.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] or a store failure.
    pub async fn save_agent(&self, agent_id: &str) -> Result<()> {
        let store = self.require_store()?;
        let snapshot = self.snapshot(agent_id)?;
        store.save(agent_id, &snapshot).await
    }

    /// Removes an agent from the simulation. Its stored snapshot is kept.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn remove_agent(&self, agent_id: &str) -> Result<()> {
        let handle = self.registry.remove(agent_id)?;
        handle.lock().release();
        let purged = self
            .world
            .proximity_cache()
            .delete_prefix(&format!("{agent_id}:"));
        info!(agent_id, purged, "agent removed");
        Ok(())
    }

    /// Registered agent ids, sorted.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    /// Number of registered agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.registry.len()
    }

    // ------------------------------------------------------------------
    // Plan / Confirm
    // ------------------------------------------------------------------

    /// Asks the decision function for the agent's next action.
    ///
    /// Nothing in memory or position changes. On success the proposal is
    /// stored as the agent's pending action. When the decision function
    /// fails or exceeds `timeout` (default from config), a degraded
    /// `Observe` proposal is returned and the agent stays `Idle`.
    ///
    /// # Errors
    ///
    /// - [`Error::AgentNotFound`] for an unknown agent
    /// - [`Error::ActionInFlight`] while a plan is open or being made
    /// - [`Error::PlanExpired`] when the open plan outlived its timeout; the
    ///   agent is reset to `Idle` and the caller may plan again
    /// - [`Error::PlanCancelled`] when the plan was cancelled mid-decision
    pub async fn plan(
        &self,
        agent_id: &str,
        perception: Perception,
        timeout: Option<Duration>,
    ) -> Result<Proposal> {
        let handle = self.registry.get(agent_id)?;
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);

        let request = {
            let mut state = handle.lock();
            match &state.phase {
                Phase::Idle => {}
                Phase::Planning { .. } => {
                    return Err(Error::ActionInFlight {
                        agent_id: agent_id.to_string(),
                        plan_id: "planning".to_string(),
                    });
                }
                Phase::AwaitingConfirmation(pending) => {
                    let plan_id = pending.plan_id;
                    if self.is_expired(pending) {
                        state.phase = Phase::Idle;
                        warn!(agent_id, %plan_id, "pending plan expired, agent reset to idle");
                        return Err(Error::PlanExpired {
                            agent_id: agent_id.to_string(),
                            plan_id: plan_id.to_string(),
                        });
                    }
                    return Err(Error::ActionInFlight {
                        agent_id: agent_id.to_string(),
                        plan_id: plan_id.to_string(),
                    });
                }
            }
            state.phase = Phase::Planning { ticket };
            self.decision_request(&mut state, perception)
        };

        let guard = PlanGuard {
            handle: &handle,
            ticket,
            armed: true,
        };
        let deadline = timeout.unwrap_or_else(|| self.settings.decision_timeout());
        let decided = tokio::time::timeout(deadline, self.decider.decide(&request)).await;
        guard.disarm();

        let mut state = handle.lock();
        if !matches!(state.phase, Phase::Planning { ticket: owner } if owner == ticket) {
            warn!(agent_id, "plan cancelled while deciding");
            return Err(Error::PlanCancelled(agent_id.to_string()));
        }

        match decided {
            Ok(Ok(action)) => {
                let plan_id = Uuid::new_v4();
                info!(agent_id, %plan_id, action = action.kind(), "plan stored");
                state.phase = Phase::AwaitingConfirmation(PendingAction {
                    agent_id: agent_id.to_string(),
                    plan_id,
                    action: action.clone(),
                    issued_at: self.clock.now(),
                    state: PendingState::Planned,
                });
                Ok(Proposal {
                    agent_id: agent_id.to_string(),
                    plan_id: Some(plan_id),
                    action,
                    degraded: false,
                    reason: None,
                })
            }
            Ok(Err(e)) => {
                state.phase = Phase::Idle;
                let err = Error::Decision(e.to_string());
                warn!(agent_id, error = %err, "decision failed, falling back to observe");
                Ok(Proposal::fallback(agent_id, err.to_string()))
            }
            Err(_elapsed) => {
                state.phase = Phase::Idle;
                let err = Error::DecisionTimeout {
                    agent_id: agent_id.to_string(),
                    timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                };
                warn!(agent_id, error = %err, "decision timed out, falling back to observe");
                Ok(Proposal::fallback(agent_id, err.to_string()))
            }
        }
    }

    /// Commits the outcome of the agent's pending action.
    ///
    /// Records exactly one memory event and, if the tile changed, one
    /// position update; then clears the pending slot. The outcome is
    /// validated before anything changes.
    ///
    /// # Errors
    ///
    /// - [`Error::StaleConfirmation`] when no pending action matches
    ///   `outcome.plan_id` (nothing changes)
    /// - [`Error::PlanExpired`] when the pending action outlived its timeout
    ///   (the agent is reset to `Idle`)
    /// - [`Error::InvalidSalience`] / [`Error::RoomMismatch`] for a bad
    ///   outcome (the pending action is kept)
    pub async fn confirm(&self, agent_id: &str, outcome: ActionOutcome) -> Result<ConfirmAck> {
        let handle = self.registry.get(agent_id)?;

        let (mut ack, snapshot) = {
            let mut state = handle.lock();
            let pending_plan = match &state.phase {
                Phase::AwaitingConfirmation(pending) => pending,
                _ => {
                    warn!(agent_id, plan_id = %outcome.plan_id, "stale confirmation, nothing pending");
                    return Err(Error::StaleConfirmation {
                        agent_id: agent_id.to_string(),
                        reason: "no action awaiting confirmation".to_string(),
                    });
                }
            };
            if pending_plan.plan_id != outcome.plan_id {
                let reason = format!(
                    "plan {} does not match pending plan {}",
                    outcome.plan_id, pending_plan.plan_id
                );
                warn!(agent_id, %reason, "stale confirmation");
                return Err(Error::StaleConfirmation {
                    agent_id: agent_id.to_string(),
                    reason,
                });
            }
            if self.is_expired(pending_plan) {
                state.phase = Phase::Idle;
                warn!(agent_id, plan_id = %outcome.plan_id, "confirmation arrived after expiry");
                return Err(Error::PlanExpired {
                    agent_id: agent_id.to_string(),
                    plan_id: outcome.plan_id.to_string(),
                });
            }

            let salience = Salience::new(outcome.salience)?;
            let current = state.position().clone();
            let move_to = outcome.new_tile.filter(|&tile| tile != current.tile);
            let landing_room = match move_to {
                Some(tile) => self.check_room(tile, outcome.room.as_deref())?,
                None => current.room.clone(),
            };

            let mut pending = match std::mem::replace(&mut state.phase, Phase::Idle) {
                Phase::AwaitingConfirmation(pending) => pending,
                other => {
                    state.phase = other;
                    return Err(Error::StaleConfirmation {
                        agent_id: agent_id.to_string(),
                        reason: "pending action vanished".to_string(),
                    });
                }
            };
            pending.state = PendingState::Confirmed;

            let location = outcome
                .location
                .or(landing_room)
                .unwrap_or_else(|| "unknown".to_string());
            let event_id = state.memory_mut().add_event(NewEvent {
                timestamp: outcome.timestamp,
                location,
                description: outcome.description,
                salience: i64::from(salience.get()),
                tags: outcome.tags,
            })?;
            if let Some(tile) = move_to {
                state
                    .tracker_mut()
                    .update_position(tile, outcome.room.as_deref(), outcome.timestamp)?;
            }

            info!(
                agent_id,
                plan_id = %pending.plan_id,
                event_id,
                moved = move_to.is_some(),
                "action confirmed"
            );

            let ack = ConfirmAck {
                agent_id: agent_id.to_string(),
                plan_id: pending.plan_id,
                action: pending.action,
                event_id,
                position: state.position().clone(),
                moved: move_to.is_some(),
                persistence: PersistenceStatus::Skipped,
                persistence_error: None,
            };
            let snapshot = (self.store.is_some() && self.settings.persist_on_confirm)
                .then(|| state.snapshot());
            (ack, snapshot)
        };

        if let (Some(store), Some(snapshot)) = (&self.store, snapshot) {
            let saved = retry_async(&self.save_retry, "save_snapshot", is_transient_storage, || {
                store.save(agent_id, &snapshot)
            })
            .await;
            match saved {
                Ok(()) => ack.persistence = PersistenceStatus::Saved,
                Err(e) => {
                    warn!(agent_id, error = %e, "snapshot save failed after commit");
                    ack.persistence = PersistenceStatus::Failed;
                    ack.persistence_error = Some(e.to_string());
                }
            }
        }
        Ok(ack)
    }

    /// Drops the agent's open or in-progress plan. Returns whether there
    /// was one.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn cancel_plan(&self, agent_id: &str) -> Result<bool> {
        let handle = self.registry.get(agent_id)?;
        let mut state = handle.lock();
        let had_plan = !matches!(state.phase, Phase::Idle);
        state.phase = Phase::Idle;
        if had_plan {
            info!(agent_id, "plan cancelled");
        }
        Ok(had_plan)
    }

    /// Resets every agent whose pending action outlived the timeout.
    pub fn expire_stale_plans(&self) -> Vec<ExpiredPlan> {
        let mut expired = Vec::new();
        for agent_id in self.registry.ids() {
            let Ok(handle) = self.registry.get(&agent_id) else {
                continue;
            };
            let mut state = handle.lock();
            let plan_id = match &state.phase {
                Phase::AwaitingConfirmation(pending) if self.is_expired(pending) => pending.plan_id,
                _ => continue,
            };
            state.phase = Phase::Idle;
            warn!(agent_id = %agent_id, %plan_id, "pending plan expired");
            expired.push(ExpiredPlan { agent_id, plan_id });
        }
        expired
    }

    /// Plans several agents concurrently. A failing agent gets a degraded
    /// `Observe` proposal; the others are unaffected. Results keep input
    /// order.
    pub async fn plan_batch(
        &self,
        batch: Vec<(String, Perception)>,
        timeout: Option<Duration>,
    ) -> Vec<Proposal> {
        let started = batch.len();
        let proposals = join_all(batch.into_iter().map(|(agent_id, perception)| async move {
            match self.plan(&agent_id, perception, timeout).await {
                Ok(proposal) => proposal,
                Err(e) => {
                    debug!(agent_id = %agent_id, error = %e, "batch plan degraded");
                    Proposal::fallback(&agent_id, e.to_string())
                }
            }
        }))
        .await;
        let degraded = proposals.iter().filter(|p| p.degraded).count();
        info!(agents = started, degraded, "batch planned");
        proposals
    }

    /// Confirms several agents concurrently. Results keep input order.
    pub async fn confirm_batch(&self, batch: Vec<(String, ActionOutcome)>) -> Vec<BatchConfirmResult> {
        join_all(batch.into_iter().map(|(agent_id, outcome)| async move {
            let result = self.confirm(&agent_id, outcome).await;
            BatchConfirmResult { agent_id, result }
        }))
        .await
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Plan/confirm status of an agent.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn status(&self, agent_id: &str) -> Result<AgentStatus> {
        Ok(self.registry.get(agent_id)?.lock().status())
    }

    /// Memories relevant to `context`, best first.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] or [`Error::InvalidSalience`].
    pub fn relevant_memories(
        &self,
        agent_id: &str,
        context: &str,
        limit: usize,
        min_salience: i64,
    ) -> Result<Vec<MemoryEvent>> {
        let min = Salience::new(min_salience)?;
        let handle = self.registry.get(agent_id)?;
        let state = handle.lock();
        Ok(state.memory().get_relevant(context, limit, min))
    }

    /// Current position.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn position(&self, agent_id: &str) -> Result<AgentPosition> {
        Ok(self.registry.get(agent_id)?.lock().position().clone())
    }

    /// Occupants within `radius` of the agent.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn nearby(&self, agent_id: &str, radius: u32) -> Result<Vec<Neighbor>> {
        Ok(self.registry.get(agent_id)?.lock().tracker_mut().nearby(radius))
    }

    /// Tiles the agent can reach in `max_distance` steps.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn movement_options(&self, agent_id: &str, max_distance: u32) -> Result<Vec<Tile>> {
        Ok(self
            .registry
            .get(agent_id)?
            .lock()
            .tracker()
            .movement_options(max_distance))
    }

    /// Distance from the agent to `tile`.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn distance(&self, agent_id: &str, tile: Tile) -> Result<i64> {
        Ok(self.registry.get(agent_id)?.lock().tracker().distance(tile))
    }

    /// Serializable copy of an agent.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn snapshot(&self, agent_id: &str) -> Result<AgentSnapshot> {
        Ok(self.registry.get(agent_id)?.lock().snapshot())
    }

    /// The agent's open pending action, if any.
    ///
    /// # Errors
    ///
    /// [`Error::AgentNotFound`] if the id is unknown.
    pub fn pending(&self, agent_id: &str) -> Result<Option<PendingAction>> {
        Ok(self.registry.get(agent_id)?.lock().pending().cloned())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn new_memory(&self) -> EpisodicMemory {
        EpisodicMemory::new(self.memory.capacity, self.memory.retention)
    }

    fn require_store(&self) -> Result<&Arc<dyn StateStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::Storage("no state store configured".to_string()))
    }

    fn is_expired(&self, pending: &PendingAction) -> bool {
        self.clock.now().saturating_duration_since(pending.issued_at)
            >= self.settings.pending_timeout()
    }

    /// Room of `tile`, after checking a caller-supplied `room` against it.
    fn check_room(&self, tile: Tile, room: Option<&str>) -> Result<Option<String>> {
        let derived = self.world.rooms().room_name(tile);
        if let Some(given) = room {
            if derived != Some(given) {
                return Err(Error::RoomMismatch {
                    x: tile.x,
                    y: tile.y,
                    given: given.to_string(),
                    derived: derived.map(str::to_string),
                });
            }
        }
        Ok(derived.map(str::to_string))
    }

    fn decision_request(&self, state: &mut AgentState, perception: Perception) -> DecisionRequest {
        let min = Salience::new(i64::from(self.settings.context_min_salience)).unwrap_or(Salience::MIN);
        let memories = state.memory().get_relevant(
            &perception.memory_context(),
            self.settings.context_limit,
            min,
        );
        let nearby = state.tracker_mut().nearby(self.perception_radius);
        DecisionRequest {
            agent_id: state.agent_id().to_string(),
            position: state.position().clone(),
            perception,
            memories,
            nearby,
        }
    }
}

/// Store failures worth another attempt. A snapshot that cannot be
/// serialized will not serialize on retry either.
fn is_transient_storage(err: &Error) -> bool {
    matches!(err, Error::Storage(_) | Error::Io(_))
}
