//! Per-agent position tracking over a shared spatial world.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::geometry::{DistanceMetric, Tile};
use super::occupancy::{Neighbor, OccupancyMap, OccupantKind};
use super::rooms::RoomTable;
use crate::cache::TtlLruCache;
use crate::error::{Error, Result};

/// Shared cache for proximity results, keyed `agentId:nearby:<radius>`.
pub type ProximityCache = TtlLruCache<String, Vec<Neighbor>>;

/// Cache key for an agent's proximity result at `radius`.
#[must_use]
pub fn nearby_key(agent_id: &str, radius: u32) -> String {
    format!("{agent_id}:nearby:{radius}")
}

/// Where an agent is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPosition {
    /// Current tile.
    pub tile: Tile,
    /// Room derived from `tile`; `None` outside every room.
    pub room: Option<String>,
    /// Simulation time of the last update.
    pub updated_at: i64,
}

/// Everything the trackers of all agents share.
#[derive(Debug)]
pub struct SpatialWorld {
    rooms: RoomTable,
    occupancy: OccupancyMap,
    metric: DistanceMetric,
    proximity: Arc<ProximityCache>,
    proximity_ttl: Option<Duration>,
    max_movement: u32,
}

impl Default for SpatialWorld {
    fn default() -> Self {
        Self::new(RoomTable::default())
    }
}

impl SpatialWorld {
    /// World over `rooms` with default metric and cache.
    #[must_use]
    pub fn new(rooms: RoomTable) -> Self {
        Self {
            rooms,
            occupancy: OccupancyMap::default(),
            metric: DistanceMetric::default(),
            proximity: Arc::new(ProximityCache::new(1024)),
            proximity_ttl: Some(Duration::from_secs(2)),
            max_movement: 16,
        }
    }

    /// Sets the distance metric.
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Sets the coarse cell size of the occupancy hash.
    #[must_use]
    pub fn with_occupancy_cell_size(mut self, cell_size: i32) -> Self {
        self.occupancy = OccupancyMap::new(cell_size);
        self
    }

    /// Uses `cache` for proximity results, each kept for `ttl`.
    #[must_use]
    pub fn with_proximity_cache(mut self, cache: Arc<ProximityCache>, ttl: Option<Duration>) -> Self {
        self.proximity = cache;
        self.proximity_ttl = ttl;
        self
    }

    /// Upper bound on `movement_options` search depth.
    #[must_use]
    pub fn with_max_movement(mut self, max: u32) -> Self {
        self.max_movement = max;
        self
    }

    /// Room table.
    #[must_use]
    pub fn rooms(&self) -> &RoomTable {
        &self.rooms
    }

    /// Occupancy registry.
    #[must_use]
    pub fn occupancy(&self) -> &OccupancyMap {
        &self.occupancy
    }

    /// Proximity cache.
    #[must_use]
    pub fn proximity_cache(&self) -> &ProximityCache {
        &self.proximity
    }

    /// Configured metric.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Registers a point of interest that agents can find with `nearby`.
    pub fn place_point_of_interest(&self, id: &str, tile: Tile) {
        self.occupancy.place(id, tile, OccupantKind::PointOfInterest);
    }

    /// Removes a point of interest.
    pub fn remove_point_of_interest(&self, id: &str) -> bool {
        self.occupancy.remove(id)
    }
}

/// Tracks one agent's position.
#[derive(Debug)]
pub struct PositionTracker {
    agent_id: String,
    position: AgentPosition,
    world: Arc<SpatialWorld>,
    cached_radii: BTreeSet<u32>,
}

impl PositionTracker {
    /// Places `agent_id` at `tile` and registers it as an occupant.
    pub fn new(agent_id: impl Into<String>, tile: Tile, at: i64, world: Arc<SpatialWorld>) -> Self {
        let agent_id = agent_id.into();
        world.occupancy.place(&agent_id, tile, OccupantKind::Agent);
        let room = world.rooms.room_name(tile).map(str::to_string);
        Self {
            agent_id,
            position: AgentPosition {
                tile,
                room,
                updated_at: at,
            },
            world,
            cached_radii: BTreeSet::new(),
        }
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> &AgentPosition {
        &self.position
    }

    /// Moves the agent.
    ///
    /// The room always comes from the room table. A supplied `room` is only
    /// checked against it. Cached proximity results for this agent are
    /// deleted.
    ///
    /// # Errors
    ///
    /// [`Error::RoomMismatch`] when `room` disagrees with the table. The
    /// position is left unchanged.
    pub fn update_position(&mut self, tile: Tile, room: Option<&str>, at: i64) -> Result<()> {
        let derived = self.world.rooms.room_name(tile);
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

        self.position = AgentPosition {
            tile,
            room: derived.map(str::to_string),
            updated_at: at,
        };
        self.world
            .occupancy
            .place(&self.agent_id, tile, OccupantKind::Agent);
        self.invalidate_proximity();
        Ok(())
    }

    /// Occupants within `radius`, nearest first, excluding this agent.
    pub fn nearby(&mut self, radius: u32) -> Vec<Neighbor> {
        let key = nearby_key(&self.agent_id, radius);
        if let Some(hit) = self.world.proximity.get(&key) {
            return hit;
        }
        let found = self.world.occupancy.within(
            self.position.tile,
            radius,
            self.world.metric,
            Some(self.agent_id.as_str()),
        );
        self.world
            .proximity
            .put(key, found.clone(), self.world.proximity_ttl);
        self.cached_radii.insert(radius);
        found
    }

    /// Distance from the current tile to `other`.
    #[must_use]
    pub fn distance(&self, other: Tile) -> i64 {
        self.world.metric.distance(self.position.tile, other)
    }

    /// Tiles reachable in at most `max_distance` orthogonal steps.
    ///
    /// Steps never cross between unconnected regions. Results are ordered by
    /// step count, then tile. The current tile is not included.
    #[must_use]
    pub fn movement_options(&self, max_distance: u32) -> Vec<Tile> {
        let rooms = &self.world.rooms;
        let limit = max_distance.min(self.world.max_movement);
        let start = self.position.tile;

        let mut seen = FxHashSet::default();
        seen.insert(start);
        let mut frontier = VecDeque::from([(start, 0u32)]);
        let mut reachable = Vec::new();

        while let Some((tile, steps)) = frontier.pop_front() {
            if steps >= limit {
                continue;
            }
            let here = rooms.room_name(tile);
            for next in tile.neighbours() {
                if seen.contains(&next) || !rooms.connected(here, rooms.room_name(next)) {
                    continue;
                }
                seen.insert(next);
                reachable.push((steps + 1, next));
                frontier.push_back((next, steps + 1));
            }
        }

        reachable.sort_unstable();
        reachable.into_iter().map(|(_, tile)| tile).collect()
    }

    /// Deletes this agent's cached proximity results.
    pub fn invalidate_proximity(&mut self) {
        for radius in std::mem::take(&mut self.cached_radii) {
            self.world
                .proximity
                .delete(&nearby_key(&self.agent_id, radius));
        }
    }

    /// Unregisters the agent from the shared world.
    pub fn release(&mut self) {
        self.invalidate_proximity();
        self.world.occupancy.remove(&self.agent_id);
        debug!(agent_id = %self.agent_id, "released position");
    }
}
