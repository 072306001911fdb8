//! Secondary indices over an agent's memory log.
//!
//! All three indices map a key to an ordered set of event ids. Buckets that
//! become empty are removed so an evicted id leaves no trace.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet};

use super::event::{EventId, MemoryEvent, Salience};

/// Splits text into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

/// Tokens an event is reachable under: description plus tags.
pub(crate) fn event_tokens(event: &MemoryEvent) -> FxHashSet<String> {
    let mut tokens: FxHashSet<String> = tokenize(event.description()).collect();
    for tag in event.tags() {
        tokens.extend(tokenize(tag));
    }
    tokens
}

/// Salience bucket -> ids.
#[derive(Debug, Default)]
pub(crate) struct SalienceIndex {
    buckets: [BTreeSet<EventId>; 10],
}

impl SalienceIndex {
    pub(crate) fn insert(&mut self, salience: Salience, id: EventId) {
        self.buckets[salience.bucket()].insert(id);
    }

    pub(crate) fn remove(&mut self, salience: Salience, id: EventId) -> bool {
        self.buckets[salience.bucket()].remove(&id)
    }

    pub(crate) fn contains(&self, id: EventId) -> bool {
        self.buckets.iter().any(|bucket| bucket.contains(&id))
    }

    /// Buckets from `min` upward, highest salience first.
    pub(crate) fn descending_from(
        &self,
        min: Salience,
    ) -> impl Iterator<Item = &BTreeSet<EventId>> + '_ {
        self.buckets[min.bucket()..].iter().rev()
    }

    /// Lowest non-empty bucket.
    pub(crate) fn lowest(&self) -> Option<&BTreeSet<EventId>> {
        self.buckets.iter().find(|bucket| !bucket.is_empty())
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.iter().map(BTreeSet::len).sum()
    }

    pub(crate) fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }
}

/// Token -> ids, for free-text and tag lookups.
#[derive(Debug, Default)]
pub(crate) struct ContextIndex {
    by_token: FxHashMap<String, BTreeSet<EventId>>,
}

impl ContextIndex {
    pub(crate) fn insert(&mut self, event: &MemoryEvent) {
        for token in event_tokens(event) {
            self.by_token.entry(token).or_default().insert(event.id());
        }
    }

    pub(crate) fn remove(&mut self, event: &MemoryEvent) {
        for token in event_tokens(event) {
            if let Some(ids) = self.by_token.get_mut(&token) {
                ids.remove(&event.id());
                if ids.is_empty() {
                    self.by_token.remove(&token);
                }
            }
        }
    }

    /// Union of ids matching any token of `context`.
    pub(crate) fn resolve(&self, context: &str) -> FxHashSet<EventId> {
        let mut ids = FxHashSet::default();
        for token in tokenize(context) {
            if let Some(bucket) = self.by_token.get(&token) {
                ids.extend(bucket.iter().copied());
            }
        }
        ids
    }

    pub(crate) fn contains(&self, id: EventId) -> bool {
        self.by_token.values().any(|ids| ids.contains(&id))
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = EventId> + '_ {
        self.by_token.values().flat_map(|ids| ids.iter().copied())
    }

    pub(crate) fn token_count(&self) -> usize {
        self.by_token.len()
    }

    pub(crate) fn clear(&mut self) {
        self.by_token.clear();
    }
}

/// Timestamp -> ids, for recency ordering and time-range queries.
///
/// Inserts cost O(log n) rather than the O(1) of an append log. Timestamps
/// come from the caller and may arrive out of order, so arrival order is not
/// time order; the ordered map keeps `recent`, `older_than` and oldest-first
/// eviction exact regardless.
#[derive(Debug, Default)]
pub(crate) struct RecencyIndex {
    by_timestamp: BTreeMap<i64, BTreeSet<EventId>>,
    len: usize,
}

impl RecencyIndex {
    pub(crate) fn insert(&mut self, timestamp: i64, id: EventId) {
        if self.by_timestamp.entry(timestamp).or_default().insert(id) {
            self.len += 1;
        }
    }

    pub(crate) fn remove(&mut self, timestamp: i64, id: EventId) -> bool {
        let Some(ids) = self.by_timestamp.get_mut(&timestamp) else {
            return false;
        };
        let removed = ids.remove(&id);
        if ids.is_empty() {
            self.by_timestamp.remove(&timestamp);
        }
        if removed {
            self.len -= 1;
        }
        removed
    }

    pub(crate) fn contains(&self, id: EventId) -> bool {
        self.by_timestamp.values().any(|ids| ids.contains(&id))
    }

    /// Newest first; equal timestamps keep ascending id order.
    pub(crate) fn newest_first(&self) -> impl Iterator<Item = (i64, EventId)> + '_ {
        self.by_timestamp
            .iter()
            .rev()
            .flat_map(|(&ts, ids)| ids.iter().map(move |&id| (ts, id)))
    }

    /// Oldest first.
    pub(crate) fn oldest_first(&self) -> impl Iterator<Item = (i64, EventId)> + '_ {
        self.by_timestamp
            .iter()
            .flat_map(|(&ts, ids)| ids.iter().map(move |&id| (ts, id)))
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn clear(&mut self) {
        self.by_timestamp.clear();
        self.len = 0;
    }
}
