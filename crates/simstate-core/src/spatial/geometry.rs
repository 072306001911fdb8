//! Tiles, distance metrics and coarse grid cells.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A discrete grid coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Tile {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Tile {
    /// Creates a tile.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The four orthogonal neighbours.
    pub(crate) fn neighbours(self) -> [Tile; 4] {
        [
            Tile::new(self.x.saturating_add(1), self.y),
            Tile::new(self.x.saturating_sub(1), self.y),
            Tile::new(self.x, self.y.saturating_add(1)),
            Tile::new(self.x, self.y.saturating_sub(1)),
        ]
    }

    /// Coarse grid cell holding this tile.
    pub(crate) fn cell(self, cell_size: i32) -> Cell {
        Cell(self.x.div_euclid(cell_size), self.y.div_euclid(cell_size))
    }
}

impl From<(i32, i32)> for Tile {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Coarse grid cell used by the room buckets and the occupancy hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Cell(pub(crate) i32, pub(crate) i32);

/// How distance between two tiles is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `max(|dx|, |dy|)`; diagonal steps cost 1.
    #[default]
    Chebyshev,
    /// Straight-line distance, rounded down.
    Euclidean,
}

impl DistanceMetric {
    /// Distance between `a` and `b`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn distance(self, a: Tile, b: Tile) -> i64 {
        let dx = i64::from(a.x.abs_diff(b.x));
        let dy = i64::from(a.y.abs_diff(b.y));
        match self {
            Self::Chebyshev => dx.max(dy),
            Self::Euclidean => {
                // Squares of i32 spans need 65 bits.
                let (wx, wy) = (i128::from(dx), i128::from(dy));
                let squared = wx * wx + wy * wy;
                let mut root = (squared as f64).sqrt() as i128;
                // Correct float rounding at perfect squares.
                while root * root > squared {
                    root -= 1;
                }
                while (root + 1) * (root + 1) <= squared {
                    root += 1;
                }
                root as i64
            }
        }
    }

    /// True when `b` lies within `radius` of `a`. Exact for both metrics.
    #[must_use]
    pub fn within(self, a: Tile, b: Tile, radius: u32) -> bool {
        let r = u128::from(radius);
        let dx = u128::from(a.x.abs_diff(b.x));
        let dy = u128::from(a.y.abs_diff(b.y));
        match self {
            Self::Chebyshev => dx <= r && dy <= r,
            Self::Euclidean => dx * dx + dy * dy <= r * r,
        }
    }
}
