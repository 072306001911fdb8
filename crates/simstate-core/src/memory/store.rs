//! Episodic memory: an agent's append-mostly event log.
//!
//! Every event is reachable through three indices (salience, context
//! tokens, recency). Insertion and retention eviction update all of them in
//! the same call, so a removed id never lingers in any index.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::debug;

use super::event::{EventId, MemoryEvent, Salience};
use super::index::{ContextIndex, RecencyIndex, SalienceIndex};
use crate::error::{Error, Result};

/// Which event goes first when the store is over capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Lowest salience, then oldest timestamp, then lowest id.
    #[default]
    LowestSalience,
    /// Oldest timestamp, then lowest id.
    OldestFirst,
}

/// Where an event id is currently indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexMembership {
    /// Present in the event log.
    pub log: bool,
    /// Present in the salience index.
    pub salience: bool,
    /// Present under at least one context token.
    pub context: bool,
    /// Present in the recency index.
    pub recency: bool,
}

impl IndexMembership {
    /// True when the id is nowhere.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        !(self.log || self.salience || self.context || self.recency)
    }
}

/// Serializable form of an [`EpisodicMemory`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Next id to hand out.
    pub next_id: EventId,
    /// Events in id order.
    pub events: Vec<MemoryEvent>,
}

/// Input for [`EpisodicMemory::add_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    /// Simulation time.
    pub timestamp: i64,
    /// Free text or room id.
    pub location: String,
    /// What happened.
    pub description: String,
    /// Raw salience, validated on insert.
    pub salience: i64,
    /// Free-form tags.
    pub tags: BTreeSet<String>,
}

impl NewEvent {
    /// Event without tags.
    pub fn new(
        timestamp: i64,
        location: impl Into<String>,
        description: impl Into<String>,
        salience: i64,
    ) -> Self {
        Self {
            timestamp,
            location: location.into(),
            description: description.into(),
            salience,
            tags: BTreeSet::new(),
        }
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

/// Per-agent episodic memory store.
#[derive(Debug)]
pub struct EpisodicMemory {
    events: FxHashMap<EventId, MemoryEvent>,
    by_salience: SalienceIndex,
    by_context: ContextIndex,
    by_recency: RecencyIndex,
    next_id: EventId,
    /// Maximum number of events; 0 = unbounded.
    capacity: usize,
    policy: RetentionPolicy,
}

impl Default for EpisodicMemory {
    fn default() -> Self {
        Self::new(0, RetentionPolicy::default())
    }
}

impl EpisodicMemory {
    /// Creates a store. `capacity == 0` means unbounded.
    #[must_use]
    pub fn new(capacity: usize, policy: RetentionPolicy) -> Self {
        Self {
            events: FxHashMap::default(),
            by_salience: SalienceIndex::default(),
            by_context: ContextIndex::default(),
            by_recency: RecencyIndex::default(),
            next_id: 1,
            capacity,
            policy,
        }
    }

    /// Configured capacity (0 = unbounded).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured retention policy.
    #[must_use]
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when no events are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Records an event and returns its id.
    ///
    /// Salience is validated before anything is touched. If the store is then
    /// over capacity, the retention policy evicts one event, which can be
    /// the new one.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSalience`] when salience is outside `[1, 10]`.
    pub fn add_event(&mut self, event: NewEvent) -> Result<EventId> {
        let salience = Salience::new(event.salience)?;
        let id = self.next_id;
        self.next_id += 1;

        self.insert(MemoryEvent::new(
            id,
            event.timestamp,
            event.location,
            event.description,
            salience,
            event.tags,
        ));

        if self.capacity > 0 && self.events.len() > self.capacity {
            if let Some(victim) = self.eviction_victim() {
                self.remove(victim);
                debug!(
                    evicted = victim,
                    inserted = id,
                    policy = ?self.policy,
                    "memory over capacity, evicted event"
                );
            }
        }

        Ok(id)
    }

    /// Looks up an event by id.
    ///
    /// # Errors
    ///
    /// [`Error::EventNotFound`] when the id is unknown or was evicted.
    pub fn get(&self, id: EventId) -> Result<&MemoryEvent> {
        self.events.get(&id).ok_or(Error::EventNotFound(id))
    }

    /// Events relevant to `context`, best first.
    ///
    /// Context tokens are matched against description and tag tokens; an
    /// empty (or token-free) context considers every event.
    #[must_use]
    pub fn get_relevant(
        &self,
        context: &str,
        limit: usize,
        min_salience: Salience,
    ) -> Vec<MemoryEvent> {
        if super::index::tokenize(context).next().is_none() {
            return self.get_high_salience(min_salience, limit);
        }
        let candidates = self.by_context.resolve(context);
        self.rank(
            candidates.into_iter().filter_map(|id| self.events.get(&id)),
            limit,
            min_salience,
        )
    }

    /// Events at `location` (case-insensitive), best first.
    #[must_use]
    pub fn get_by_location(&self, location: &str, limit: usize) -> Vec<MemoryEvent> {
        self.rank(
            self.events
                .values()
                .filter(|e| e.location().eq_ignore_ascii_case(location)),
            limit,
            Salience::MIN,
        )
    }

    /// Events with salience `>= min_salience`, best first.
    ///
    /// Walks the salience buckets from the top and stops once `limit` is met.
    #[must_use]
    pub fn get_high_salience(&self, min_salience: Salience, limit: usize) -> Vec<MemoryEvent> {
        let mut out = Vec::with_capacity(limit.min(self.events.len()));
        for bucket in self.by_salience.descending_from(min_salience) {
            if out.len() >= limit {
                break;
            }
            let mut events: Vec<&MemoryEvent> =
                bucket.iter().filter_map(|id| self.events.get(id)).collect();
            events.sort_by_key(|e| (Reverse(e.timestamp()), e.id()));
            out.extend(events.into_iter().take(limit - out.len()).cloned());
        }
        out
    }

    /// Most recent events, newest first, optionally only after `since`.
    #[must_use]
    pub fn recent(&self, limit: usize, since: Option<i64>) -> Vec<MemoryEvent> {
        self.by_recency
            .newest_first()
            .take_while(|&(ts, _)| since.map_or(true, |s| ts > s))
            .take(limit)
            .filter_map(|(_, id)| self.events.get(&id).cloned())
            .collect()
    }

    /// Events strictly before `timestamp`, oldest first.
    #[must_use]
    pub fn older_than(&self, timestamp: i64, limit: usize) -> Vec<MemoryEvent> {
        self.by_recency
            .oldest_first()
            .take_while(|&(ts, _)| ts < timestamp)
            .take(limit)
            .filter_map(|(_, id)| self.events.get(&id).cloned())
            .collect()
    }

    /// Where `id` currently appears.
    #[must_use]
    pub fn index_membership(&self, id: EventId) -> IndexMembership {
        IndexMembership {
            log: self.events.contains_key(&id),
            salience: self.by_salience.contains(id),
            context: self.by_context.contains(id),
            recency: self.by_recency.contains(id),
        }
    }

    /// Cross-checks the log against every index. Returns the problems found.
    #[must_use]
    pub fn check_consistency(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.by_salience.len() != self.events.len() {
            problems.push(format!(
                "salience index holds {} ids, log holds {}",
                self.by_salience.len(),
                self.events.len()
            ));
        }
        if self.by_recency.len() != self.events.len() {
            problems.push(format!(
                "recency index holds {} ids, log holds {}",
                self.by_recency.len(),
                self.events.len()
            ));
        }
        for id in self.by_context.ids() {
            if !self.events.contains_key(&id) {
                problems.push(format!("context index references missing event {id}"));
            }
        }
        for (id, event) in &self.events {
            let membership = self.index_membership(*id);
            if !membership.salience || !membership.recency {
                problems.push(format!("event {id} missing from an index"));
            }
            if !super::index::event_tokens(event).is_empty() && !membership.context {
                problems.push(format!("event {id} missing from context index"));
            }
        }
        problems
    }

    /// Number of distinct context tokens indexed.
    #[must_use]
    pub fn context_token_count(&self) -> usize {
        self.by_context.token_count()
    }

    /// Copies the store into its serializable form.
    #[must_use]
    pub fn snapshot(&self) -> MemorySnapshot {
        let mut events: Vec<MemoryEvent> = self.events.values().cloned().collect();
        events.sort_by_key(MemoryEvent::id);
        MemorySnapshot {
            next_id: self.next_id,
            events,
        }
    }

    /// Replaces the contents with `snapshot`, rebuilding every index.
    ///
    /// Capacity is enforced afterwards, so a snapshot from a larger store is
    /// trimmed by the current policy.
    pub fn restore(&mut self, snapshot: MemorySnapshot) {
        self.events.clear();
        self.by_salience.clear();
        self.by_context.clear();
        self.by_recency.clear();

        let max_id = snapshot.events.iter().map(MemoryEvent::id).max().unwrap_or(0);
        self.next_id = snapshot.next_id.max(max_id + 1);
        for event in snapshot.events {
            self.insert(event);
        }
        while self.capacity > 0 && self.events.len() > self.capacity {
            match self.eviction_victim() {
                Some(victim) => {
                    self.remove(victim);
                }
                None => break,
            }
        }
    }

    fn insert(&mut self, event: MemoryEvent) {
        let id = event.id();
        self.by_salience.insert(event.salience(), id);
        self.by_recency.insert(event.timestamp(), id);
        self.by_context.insert(&event);
        self.events.insert(id, event);
    }

    fn remove(&mut self, id: EventId) -> Option<MemoryEvent> {
        let event = self.events.remove(&id)?;
        self.by_salience.remove(event.salience(), id);
        self.by_recency.remove(event.timestamp(), id);
        self.by_context.remove(&event);
        Some(event)
    }

    fn eviction_victim(&self) -> Option<EventId> {
        match self.policy {
            RetentionPolicy::LowestSalience => {
                let bucket = self.by_salience.lowest()?;
                bucket
                    .iter()
                    .filter_map(|id| self.events.get(id))
                    .min_by_key(|e| (e.timestamp(), e.id()))
                    .map(MemoryEvent::id)
            }
            RetentionPolicy::OldestFirst => self.by_recency.oldest_first().next().map(|(_, id)| id),
        }
    }

    fn rank<'a>(
        &self,
        events: impl Iterator<Item = &'a MemoryEvent>,
        limit: usize,
        min_salience: Salience,
    ) -> Vec<MemoryEvent> {
        let mut ranked: Vec<&MemoryEvent> =
            events.filter(|e| e.salience() >= min_salience).collect();
        ranked.sort_by_key(|e| (Reverse(e.salience()), Reverse(e.timestamp()), e.id()));
        ranked.into_iter().take(limit).cloned().collect()
    }
}
