//! Episodic memory for simulated agents.
//!
//! Each agent owns one [`EpisodicMemory`]: a log of immutable
//! [`MemoryEvent`]s indexed by salience, context tokens and recency.
//!
//! # Example
//!
//! ```
//! use simstate_core::memory::{EpisodicMemory, NewEvent, RetentionPolicy, Salience};
//!
//! let mut memory = EpisodicMemory::new(100, RetentionPolicy::LowestSalience);
//! memory.add_event(NewEvent::new(1, "kitchen", "saw a lamp", 4)).unwrap();
//!
//! let hits = memory.get_relevant("lamp", 5, Salience::MIN);
//! assert_eq!(hits.len(), 1);
//! ```

mod event;
mod index;
mod store;

pub use event::{EventId, MemoryEvent, Salience};
pub use index::tokenize;
pub use store::{EpisodicMemory, IndexMembership, MemorySnapshot, NewEvent, RetentionPolicy};
