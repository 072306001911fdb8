//! Spatial position tracking.
//!
//! - [`RoomTable`]: static tile -> room resolution with connectivity
//! - [`OccupancyMap`]: shared, sharded registry of occupied tiles
//! - [`PositionTracker`]: one agent's position, proximity and movement queries
//!
//! A tile's room is always derived from the table; it is never stored
//! independently of the tile.

mod geometry;
mod occupancy;
mod rooms;
mod tracker;

pub use geometry::{DistanceMetric, Tile};
pub use occupancy::{Neighbor, OccupancyMap, OccupantKind};
pub use rooms::{RoomDef, RoomShape, RoomTable};
pub use tracker::{nearby_key, AgentPosition, PositionTracker, ProximityCache, SpatialWorld};
