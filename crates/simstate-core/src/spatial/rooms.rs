//! Static room table: resolves tiles to named rooms.
//!
//! Rooms are bucketed by every coarse cell their bounding box overlaps, so a
//! lookup hashes the tile's cell and runs containment tests on that small
//! bucket only. When rooms overlap, the first declared room wins.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::geometry::{Cell, Tile};
use crate::error::{Error, Result};

/// Footprint of a room. Boundaries are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoomShape {
    /// Axis-aligned rectangle.
    Rect {
        /// Lowest corner.
        min: Tile,
        /// Highest corner.
        max: Tile,
    },
    /// Simple polygon given by its vertices in order.
    Polygon {
        /// At least three vertices.
        vertices: Vec<Tile>,
    },
}

impl RoomShape {
    fn bounding_box(&self) -> (Tile, Tile) {
        match self {
            Self::Rect { min, max } => (*min, *max),
            Self::Polygon { vertices } => {
                let min_x = vertices.iter().map(|v| v.x).min().unwrap_or(0);
                let min_y = vertices.iter().map(|v| v.y).min().unwrap_or(0);
                let max_x = vertices.iter().map(|v| v.x).max().unwrap_or(0);
                let max_y = vertices.iter().map(|v| v.y).max().unwrap_or(0);
                (Tile::new(min_x, min_y), Tile::new(max_x, max_y))
            }
        }
    }

    /// True when `tile` lies inside or on the boundary.
    #[must_use]
    pub fn contains(&self, tile: Tile) -> bool {
        match self {
            Self::Rect { min, max } => {
                (min.x..=max.x).contains(&tile.x) && (min.y..=max.y).contains(&tile.y)
            }
            Self::Polygon { vertices } => polygon_contains(vertices, tile),
        }
    }
}

/// Even-odd ray casting in integer arithmetic; points on an edge count as inside.
///
/// Cross products of i32 spans need more than 64 bits, hence `i128`.
fn polygon_contains(vertices: &[Tile], p: Tile) -> bool {
    let (px, py) = (i128::from(p.x), i128::from(p.y));
    let mut inside = false;
    for (i, a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        let (ax, ay) = (i128::from(a.x), i128::from(a.y));
        let (bx, by) = (i128::from(b.x), i128::from(b.y));

        let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
        if cross == 0
            && (ax.min(bx)..=ax.max(bx)).contains(&px)
            && (ay.min(by)..=ay.max(by)).contains(&py)
        {
            return true;
        }

        if (ay > py) != (by > py) {
            let lhs = (px - ax) * (by - ay);
            let rhs = (py - ay) * (bx - ax);
            let crosses = if by > ay { lhs < rhs } else { lhs > rhs };
            if crosses {
                inside = !inside;
            }
        }
    }
    inside
}

/// A named room declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDef {
    /// Unique room name.
    pub name: String,
    /// Footprint.
    pub shape: RoomShape,
    /// Rooms reachable directly from this one. Symmetric.
    #[serde(default)]
    pub connections: Vec<String>,
    /// Whether tiles covered by no room are reachable from here.
    #[serde(default)]
    pub exits_outside: bool,
}

impl RoomDef {
    /// Rectangular room with no connections.
    pub fn rect(name: impl Into<String>, min: Tile, max: Tile) -> Self {
        Self {
            name: name.into(),
            shape: RoomShape::Rect { min, max },
            connections: Vec::new(),
            exits_outside: false,
        }
    }

    /// Polygonal room with no connections.
    pub fn polygon(name: impl Into<String>, vertices: Vec<Tile>) -> Self {
        Self {
            name: name.into(),
            shape: RoomShape::Polygon { vertices },
            connections: Vec::new(),
            exits_outside: false,
        }
    }

    /// Adds connections.
    #[must_use]
    pub fn connected_to<I, S>(mut self, rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connections.extend(rooms.into_iter().map(Into::into));
        self
    }

    /// Marks the room as opening to the outside.
    #[must_use]
    pub fn with_exit(mut self) -> Self {
        self.exits_outside = true;
        self
    }
}

/// Immutable tile -> room lookup with connectivity.
#[derive(Debug, Default)]
pub struct RoomTable {
    rooms: Vec<RoomDef>,
    cell_size: i32,
    buckets: FxHashMap<Cell, Vec<usize>>,
    links: FxHashMap<String, FxHashSet<String>>,
}

impl RoomTable {
    /// Builds and validates a table.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a non-positive cell size, duplicate names,
    /// degenerate shapes or connections to unknown rooms.
    pub fn new(rooms: Vec<RoomDef>, cell_size: i32) -> Result<Self> {
        if cell_size < 1 {
            return Err(Error::Config(format!(
                "room cell size must be positive, got {cell_size}"
            )));
        }

        let mut names = FxHashSet::default();
        for room in &rooms {
            if !names.insert(room.name.as_str()) {
                return Err(Error::Config(format!("duplicate room '{}'", room.name)));
            }
            match &room.shape {
                RoomShape::Rect { min, max } if min.x > max.x || min.y > max.y => {
                    return Err(Error::Config(format!(
                        "room '{}' has min corner {min} above max corner {max}",
                        room.name
                    )));
                }
                RoomShape::Polygon { vertices } if vertices.len() < 3 => {
                    return Err(Error::Config(format!(
                        "room '{}' polygon needs at least 3 vertices",
                        room.name
                    )));
                }
                _ => {}
            }
        }

        let mut links: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
        for room in &rooms {
            for other in &room.connections {
                if !names.contains(other.as_str()) {
                    return Err(Error::Config(format!(
                        "room '{}' connects to unknown room '{other}'",
                        room.name
                    )));
                }
                links
                    .entry(room.name.clone())
                    .or_default()
                    .insert(other.clone());
                links
                    .entry(other.clone())
                    .or_default()
                    .insert(room.name.clone());
            }
        }

        let mut buckets: FxHashMap<Cell, Vec<usize>> = FxHashMap::default();
        for (idx, room) in rooms.iter().enumerate() {
            let (lo, hi) = room.shape.bounding_box();
            let (lo, hi) = (lo.cell(cell_size), hi.cell(cell_size));
            for cx in lo.0..=hi.0 {
                for cy in lo.1..=hi.1 {
                    buckets.entry(Cell(cx, cy)).or_default().push(idx);
                }
            }
        }

        Ok(Self {
            rooms,
            cell_size,
            buckets,
            links,
        })
    }

    /// Number of declared rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// True when no rooms are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Declared rooms in declaration order.
    #[must_use]
    pub fn rooms(&self) -> &[RoomDef] {
        &self.rooms
    }

    /// Room covering `tile`, if any.
    #[must_use]
    pub fn resolve(&self, tile: Tile) -> Option<&RoomDef> {
        if self.rooms.is_empty() {
            return None;
        }
        self.buckets
            .get(&tile.cell(self.cell_size))?
            .iter()
            .map(|&idx| &self.rooms[idx])
            .find(|room| room.shape.contains(tile))
    }

    /// Name of the room covering `tile`, if any.
    #[must_use]
    pub fn room_name(&self, tile: Tile) -> Option<&str> {
        self.resolve(tile).map(|room| room.name.as_str())
    }

    /// Whether a single step between two regions is allowed.
    ///
    /// `None` stands for the outside. A region always connects to itself.
    #[must_use]
    pub fn connected(&self, from: Option<&str>, to: Option<&str>) -> bool {
        match (from, to) {
            (a, b) if a == b => true,
            (Some(a), Some(b)) => self.links.get(a).is_some_and(|set| set.contains(b)),
            (Some(room), None) | (None, Some(room)) => self
                .rooms
                .iter()
                .find(|r| r.name == room)
                .is_some_and(|r| r.exits_outside),
            (None, None) => true,
        }
    }
}
