//! Memory event and salience types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};

/// Identifier of a memory event, unique and monotonic per agent.
pub type EventId = u64;

/// Importance rating of a memory, 1 (trivial) to 10 (critical).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Salience(u8);

impl Salience {
    /// Lowest valid salience.
    pub const MIN: Salience = Salience(1);
    /// Highest valid salience.
    pub const MAX: Salience = Salience(10);

    /// Validates a raw salience value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSalience`] outside `[1, 10]`.
    pub fn new(value: i64) -> Result<Self> {
        match u8::try_from(value) {
            Ok(v) if (1..=10).contains(&v) => Ok(Self(v)),
            _ => Err(Error::InvalidSalience(value)),
        }
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Zero-based bucket index.
    pub(crate) const fn bucket(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl TryFrom<i64> for Salience {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Salience> for u8 {
    fn from(s: Salience) -> Self {
        s.0
    }
}

impl fmt::Display for Salience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable record of something an agent experienced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEvent {
    id: EventId,
    timestamp: i64,
    location: String,
    description: String,
    salience: Salience,
    #[serde(default)]
    tags: BTreeSet<String>,
}

impl MemoryEvent {
    pub(crate) fn new(
        id: EventId,
        timestamp: i64,
        location: String,
        description: String,
        salience: Salience,
        tags: BTreeSet<String>,
    ) -> Self {
        Self {
            id,
            timestamp,
            location,
            description,
            salience,
            tags,
        }
    }

    /// Event id.
    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Simulation time of the event.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Where it happened.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// What happened.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// How important it was.
    #[must_use]
    pub fn salience(&self) -> Salience {
        self.salience
    }

    /// Free-form tags.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }
}
