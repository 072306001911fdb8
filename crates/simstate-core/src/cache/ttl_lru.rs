//! Bounded LRU cache with per-entry time-to-live.
//!
//! Recency is tracked by an intrusive doubly linked list threaded through a
//! slab of nodes, so `put`, `get` and `delete` are O(1). Expiry is lazy: an
//! expired entry is dropped when an operation touches it.

#![allow(clippy::cast_precision_loss)] // Precision loss acceptable for hit rate calculation

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::clock::{system_clock, SharedClock};

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (expired entries included).
    pub misses: u64,
    /// Number of capacity evictions.
    pub evictions: u64,
    /// Number of entries dropped because their TTL elapsed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate (0.0 to 1.0).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Node<K, V> {
    key: K,
    value: V,
    inserted_at: Instant,
    last_accessed_at: Instant,
    expires_at: Option<Instant>,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<K, V> Node<K, V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

struct Inner<K, V> {
    map: FxHashMap<K, usize>,
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    /// Least recently used.
    head: Option<usize>,
    /// Most recently used.
    tail: Option<usize>,
}

impl<K: Hash + Eq + Clone, V> Inner<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            map: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    /// Every index reachable from `map`, `head` or a link is occupied.
    fn node(&self, idx: usize) -> Option<&Node<K, V>> {
        let node = self.slots.get(idx).and_then(Option::as_ref);
        debug_assert!(node.is_some(), "linked slot {idx} is vacant");
        node
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<K, V>> {
        let node = self.slots.get_mut(idx).and_then(Option::as_mut);
        debug_assert!(node.is_some(), "linked slot {idx} is vacant");
        node
    }

    fn unlink(&mut self, idx: usize) {
        let Some(node) = self.node_mut(idx) else {
            return;
        };
        let (prev, next) = (node.prev.take(), node.next.take());
        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn push_back(&mut self, idx: usize) {
        let old_tail = self.tail;
        let Some(node) = self.node_mut(idx) else {
            return;
        };
        node.prev = old_tail;
        node.next = None;
        match old_tail.and_then(|t| self.node_mut(t)) {
            Some(tail) => tail.next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    fn alloc(&mut self, node: Node<K, V>) -> usize {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(node);
            idx
        } else {
            self.slots.push(Some(node));
            self.slots.len() - 1
        }
    }

    /// Unlinks and frees `idx`. `None` if the slot was already vacant.
    fn remove_idx(&mut self, idx: usize) -> Option<Node<K, V>> {
        self.unlink(idx);
        let node = self.slots.get_mut(idx).and_then(Option::take)?;
        self.map.remove(&node.key);
        self.free.push(idx);
        Some(node)
    }

    fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }
}

/// Thread-safe LRU cache with optional per-entry TTL.
pub struct TtlLruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    capacity: usize,
    default_ttl: Option<Duration>,
    clock: SharedClock,
    inner: Mutex<Inner<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, system_clock())
    }

    /// Create a cache that reads time from `clock`.
    #[must_use]
    pub fn with_clock(capacity: usize, clock: SharedClock) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            default_ttl: None,
            clock,
            inner: Mutex::new(Inner::with_capacity(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// TTL applied by [`put`](Self::put) when the caller passes `None`.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    /// Insert or replace `key`.
    ///
    /// Replacing refreshes recency and resets both the insertion time and
    /// the TTL. Inserting a new key into a full cache evicts the least
    /// recently used entry first.
    pub fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let expires_at = ttl.or(self.default_ttl).map(|ttl| now + ttl);
        let mut inner = self.inner.lock();

        if let Some(&idx) = inner.map.get(&key) {
            if let Some(node) = inner.node_mut(idx) {
                node.value = value;
                node.inserted_at = now;
                node.last_accessed_at = now;
                node.expires_at = expires_at;
            }
            inner.unlink(idx);
            inner.push_back(idx);
            return;
        }

        if inner.map.len() >= self.capacity {
            let lru = inner.head;
            if let Some(victim) = lru.and_then(|idx| inner.remove_idx(idx)) {
                if victim.is_expired(now) {
                    self.expirations.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let idx = inner.alloc(Node {
            key: key.clone(),
            value,
            inserted_at: now,
            last_accessed_at: now,
            expires_at,
            prev: None,
            next: None,
        });
        inner.push_back(idx);
        inner.map.insert(key, idx);
    }

    /// Get a value, bumping its recency.
    ///
    /// An expired entry counts as a miss and is removed.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let Some(&idx) = inner.map.get(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if inner.node(idx).is_none_or(|node| node.is_expired(now)) {
            inner.remove_idx(idx);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        inner.unlink(idx);
        inner.push_back(idx);
        let node = inner.node_mut(idx)?;
        node.last_accessed_at = now;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(node.value.clone())
    }

    /// Returns true if `key` is present and not expired. Does not touch recency.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        let now = self.clock.now();
        let inner = self.inner.lock();
        inner
            .map
            .get(key)
            .and_then(|&idx| inner.node(idx))
            .is_some_and(|node| !node.is_expired(now))
    }

    /// Age of an entry since its last `put`.
    #[must_use]
    pub fn age(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        inner
            .map
            .get(key)
            .and_then(|&idx| inner.node(idx))
            .map(|node| now.saturating_duration_since(node.inserted_at))
    }

    /// Time since an entry was last read or written.
    #[must_use]
    pub fn idle_time(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        inner
            .map
            .get(key)
            .and_then(|&idx| inner.node(idx))
            .map(|node| now.saturating_duration_since(node.last_accessed_at))
    }

    /// Remove a key. Returns whether it was present.
    pub fn delete(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        match inner.map.get(key).copied() {
            Some(idx) => inner.remove_idx(idx).is_some(),
            None => false,
        }
    }

    /// Remove every entry whose key matches `predicate`. O(n).
    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut inner = self.inner.lock();
        let doomed: Vec<usize> = inner
            .map
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(_, &idx)| idx)
            .collect();
        doomed
            .into_iter()
            .filter_map(|idx| inner.remove_idx(idx))
            .count()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let expired: Vec<usize> = inner
            .map
            .values()
            .copied()
            .filter(|&idx| inner.node(idx).is_some_and(|node| node.is_expired(now)))
            .collect();
        let removed = expired
            .into_iter()
            .filter_map(|idx| inner.remove_idx(idx))
            .count();
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Keys from least to most recently used.
    #[must_use]
    pub fn keys_lru_order(&self) -> Vec<K> {
        let inner = self.inner.lock();
        let mut keys = Vec::with_capacity(inner.map.len());
        let mut cursor = inner.head;
        while let Some(node) = cursor.and_then(|idx| inner.node(idx)) {
            keys.push(node.key.clone());
            cursor = node.next;
        }
        keys
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> std::fmt::Debug for TtlLruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlLruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl<V: Clone> TtlLruCache<String, V> {
    /// Remove every key starting with `prefix`.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        self.remove_where(|key| key.starts_with(prefix))
    }
}

impl<K, V> Default for TtlLruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(10_000)
    }
}
