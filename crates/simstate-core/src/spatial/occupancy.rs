//! Shared registry of occupied tiles.
//!
//! Occupants (agents and caller-supplied points of interest) are hashed by
//! coarse cell. A radius query visits the cells its square covers, or the
//! occupied cells when there are fewer of those.
//! Both maps are sharded `DashMap`s; agents only ever move themselves, so
//! contention is low.

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::geometry::{Cell, DistanceMetric, Tile};

/// What occupies a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupantKind {
    /// A simulated agent.
    Agent,
    /// A point of interest registered by the caller.
    PointOfInterest,
}

/// An occupant found by a proximity query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Occupant id.
    pub id: String,
    /// Occupant kind.
    pub kind: OccupantKind,
    /// Where it is.
    pub tile: Tile,
    /// Distance from the query centre under the query metric.
    pub distance: i64,
}

#[derive(Debug, Clone, Copy)]
struct Occupant {
    tile: Tile,
    kind: OccupantKind,
}

/// Sharded occupant registry with a coarse spatial hash.
#[derive(Debug)]
pub struct OccupancyMap {
    cell_size: i32,
    occupants: DashMap<String, Occupant>,
    cells: DashMap<Cell, FxHashMap<String, Tile>>,
}

impl Default for OccupancyMap {
    fn default() -> Self {
        Self::new(8)
    }
}

impl OccupancyMap {
    /// Creates an empty map with the given cell size (minimum 1).
    #[must_use]
    pub fn new(cell_size: i32) -> Self {
        Self {
            cell_size: cell_size.max(1),
            occupants: DashMap::new(),
            cells: DashMap::new(),
        }
    }

    /// Number of occupants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// Registers or moves an occupant.
    pub fn place(&self, id: &str, tile: Tile, kind: OccupantKind) {
        let previous = self
            .occupants
            .insert(id.to_string(), Occupant { tile, kind });
        if let Some(old) = previous {
            self.unhash(id, old.tile);
        }
        self.cells
            .entry(tile.cell(self.cell_size))
            .or_default()
            .insert(id.to_string(), tile);
    }

    /// Moves a registered occupant. Returns false if `id` is unknown.
    pub fn move_to(&self, id: &str, tile: Tile) -> bool {
        let Some(kind) = self.occupants.get(id).map(|o| o.kind) else {
            return false;
        };
        self.place(id, tile, kind);
        true
    }

    /// Removes an occupant. Returns whether it was registered.
    pub fn remove(&self, id: &str) -> bool {
        match self.occupants.remove(id) {
            Some((_, old)) => {
                self.unhash(id, old.tile);
                true
            }
            None => false,
        }
    }

    /// Tile of a registered occupant.
    #[must_use]
    pub fn tile_of(&self, id: &str) -> Option<Tile> {
        self.occupants.get(id).map(|o| o.tile)
    }

    /// Occupants within `radius` of `center`, nearest first then by id.
    ///
    /// `exclude` is skipped (usually the querying agent).
    #[must_use]
    pub fn within(
        &self,
        center: Tile,
        radius: u32,
        metric: DistanceMetric,
        exclude: Option<&str>,
    ) -> Vec<Neighbor> {
        let r = i64::from(radius);
        let clamp = |v: i64| i32::try_from(v).unwrap_or(if v < 0 { i32::MIN } else { i32::MAX });
        let lo = Tile::new(clamp(i64::from(center.x) - r), clamp(i64::from(center.y) - r));
        let hi = Tile::new(clamp(i64::from(center.x) + r), clamp(i64::from(center.y) + r));
        let (lo, hi) = (lo.cell(self.cell_size), hi.cell(self.cell_size));

        let mut found = Vec::new();
        let mut collect = |bucket: &FxHashMap<String, Tile>| {
            for (id, &tile) in bucket {
                if exclude != Some(id.as_str()) && metric.within(center, tile, radius) {
                    found.push((id.clone(), tile));
                }
            }
        };

        let span_x = u64::from(hi.0.abs_diff(lo.0)) + 1;
        let span_y = u64::from(hi.1.abs_diff(lo.1)) + 1;
        let square = span_x.saturating_mul(span_y);
        if square > self.cells.len() as u64 {
            // Fewer occupied cells than cells in the square: scan those instead.
            for entry in &self.cells {
                let Cell(cx, cy) = *entry.key();
                if (lo.0..=hi.0).contains(&cx) && (lo.1..=hi.1).contains(&cy) {
                    collect(entry.value());
                }
            }
        } else {
            for cx in lo.0..=hi.0 {
                for cy in lo.1..=hi.1 {
                    if let Some(bucket) = self.cells.get(&Cell(cx, cy)) {
                        collect(bucket.value());
                    }
                }
            }
        }

        let mut neighbors: Vec<Neighbor> = found
            .into_iter()
            .filter_map(|(id, tile)| {
                let kind = self.occupants.get(&id)?.kind;
                Some(Neighbor {
                    distance: metric.distance(center, tile),
                    id,
                    kind,
                    tile,
                })
            })
            .collect();
        neighbors.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        neighbors
    }

    fn unhash(&self, id: &str, tile: Tile) {
        let cell = tile.cell(self.cell_size);
        let now_empty = match self.cells.get_mut(&cell) {
            Some(mut bucket) => {
                bucket.remove(id);
                bucket.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.cells.remove_if(&cell, |_, bucket| bucket.is_empty());
        }
    }
}
