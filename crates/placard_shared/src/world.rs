//! World placement of a board: where it hangs, which way it faces, how big it is.

use crate::ids::WorldId;
use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// A point in a specific world.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldLocation {
    /// World the point belongs to.
    pub world: WorldId,
    /// Coordinates inside that world.
    pub position: Vec3,
}

impl WorldLocation {
    /// Creates a new location.
    #[must_use]
    pub const fn new(world: WorldId, position: Vec3) -> Self {
        Self { world, position }
    }

    /// True when both locations are in the same world.
    #[must_use]
    pub fn same_world(&self, other: &Self) -> bool {
        self.world == other.world
    }
}

/// Facing direction of a board, one of the six block faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockFace {
    /// -Y
    Down,
    /// +Y
    Up,
    /// -Z
    North,
    /// +Z
    South,
    /// -X
    West,
    /// +X
    East,
}

/// Grid dimensions of a board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    /// Number of columns.
    pub columns: u32,
    /// Number of rows.
    pub rows: u32,
}

impl GridSize {
    /// Creates a new grid size.
    #[must_use]
    pub const fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    /// Number of cells (one fragment per cell).
    #[must_use]
    pub const fn cells(self) -> u64 {
        self.columns as u64 * self.rows as u64
    }

    /// True when the grid has no cells.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.columns == 0 || self.rows == 0
    }

    /// Row-major index of a cell, `None` when out of bounds.
    #[must_use]
    pub const fn index_of(self, column: u32, row: u32) -> Option<usize> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        Some(row as usize * self.columns as usize + column as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_indexing_is_row_major() {
        let grid = GridSize::new(3, 2);
        assert_eq!(grid.cells(), 6);
        assert_eq!(grid.index_of(0, 0), Some(0));
        assert_eq!(grid.index_of(2, 0), Some(2));
        assert_eq!(grid.index_of(0, 1), Some(3));
        assert_eq!(grid.index_of(3, 0), None);
        assert_eq!(grid.index_of(0, 2), None);
    }

    #[test]
    fn test_empty_grid() {
        assert!(GridSize::new(0, 4).is_empty());
        assert!(GridSize::new(4, 0).is_empty());
        assert!(!GridSize::new(1, 1).is_empty());
    }

    #[test]
    fn test_same_world() {
        let a = WorldLocation::new(WorldId(1), Vec3::ZERO);
        let b = WorldLocation::new(WorldId(1), Vec3::new(100.0, 0.0, 0.0));
        let c = WorldLocation::new(WorldId(2), Vec3::ZERO);
        assert!(a.same_world(&b));
        assert!(!a.same_world(&c));
    }
}
