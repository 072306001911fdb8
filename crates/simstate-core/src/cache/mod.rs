//! Caching layer for `SimState`.
//!
//! - [`TtlLruCache`]: bounded LRU cache with lazy TTL expiry
//! - [`CacheStats`]: hit/miss/eviction counters
//!
//! # Thread-Safety
//!
//! The cache guards its state with one `parking_lot::Mutex`. No lock is held
//! while user code runs, so the cache can be shared freely between agents.

mod ttl_lru;

pub use ttl_lru::{CacheStats, TtlLruCache};
