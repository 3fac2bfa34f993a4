//! Static walkability model over a bounded 2D grid.
//!
//! `GridMap` answers the three questions every planner asks: is this cell
//! walkable, what are its 4-directional neighbours, and how far apart are two
//! cells. All queries are O(1) and side-effect free. The only mutation is
//! adding or clearing dynamic obstacles between ticks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A grid coordinate. Row 0 is the top of the floor plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Manhattan distance. Pure arithmetic, no bounds involved.
    pub fn manhattan(self, other: Cell) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// The four axis neighbours in fixed order: north, east, south, west.
    pub fn adjacent(self) -> [Cell; 4] {
        [
            Cell::new(self.row - 1, self.col),
            Cell::new(self.row, self.col + 1),
            Cell::new(self.row + 1, self.col),
            Cell::new(self.row, self.col - 1),
        ]
    }

    /// Unit step direction from `self` toward `other` (signum per axis).
    pub fn direction_to(self, other: Cell) -> (i32, i32) {
        ((other.row - self.row).signum(), (other.col - self.col).signum())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// What occupies a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    Free,
    Wall,
    Obstacle,
}

impl CellKind {
    pub fn is_walkable(self) -> bool {
        matches!(self, CellKind::Free)
    }
}

/// Errors raised by grid queries and floor-plan parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The cell lies outside the grid.
    #[error("cell {cell} is outside the {rows}x{cols} grid")]
    OutOfBounds { cell: Cell, rows: usize, cols: usize },

    /// The floor plan has no rows or no columns.
    #[error("floor plan is empty")]
    EmptyFloor,

    /// A floor-plan row has a different width than the first row.
    #[error("floor row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A floor-plan symbol is not part of the legend.
    #[error("unknown floor symbol {symbol:?} at row {row}, column {col}")]
    UnknownSymbol { row: usize, col: usize, symbol: char },
}

/// Dense row-major grid of cell kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridMap {
    rows: usize,
    cols: usize,
    kinds: Vec<CellKind>,
}

impl GridMap {
    /// An open grid with every cell free.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            kinds: vec![CellKind::Free; rows * cols],
        }
    }

    /// An open grid enclosed by a one-cell wall border.
    pub fn walled(rows: usize, cols: usize) -> Self {
        let mut grid = Self::new(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                if r == 0 || c == 0 || r + 1 == rows || c + 1 == cols {
                    grid.kinds[r * cols + c] = CellKind::Wall;
                }
            }
        }
        grid
    }

    /// Build a grid from explicit rows of cell kinds.
    pub fn from_rows(rows: Vec<Vec<CellKind>>) -> Result<Self, GridError> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || width == 0 {
            return Err(GridError::EmptyFloor);
        }
        let mut kinds = Vec::with_capacity(rows.len() * width);
        for (r, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(GridError::RaggedRow {
                    row: r,
                    expected: width,
                    found: row.len(),
                });
            }
            kinds.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols: width,
            kinds,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.rows
            && (cell.col as usize) < self.cols
    }

    fn index(&self, cell: Cell) -> Result<usize, GridError> {
        if self.contains(cell) {
            Ok(cell.row as usize * self.cols + cell.col as usize)
        } else {
            Err(GridError::OutOfBounds {
                cell,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    /// Check that a cell is in bounds.
    pub fn check(&self, cell: Cell) -> Result<(), GridError> {
        self.index(cell).map(|_| ())
    }

    pub fn kind(&self, cell: Cell) -> Result<CellKind, GridError> {
        Ok(self.kinds[self.index(cell)?])
    }

    pub fn is_walkable(&self, cell: Cell) -> Result<bool, GridError> {
        Ok(self.kind(cell)?.is_walkable())
    }

    /// Walkability with out-of-bounds folded to `false`. Used inside search
    /// loops where neighbours may fall off the edge.
    pub fn walkable(&self, cell: Cell) -> bool {
        self.kind(cell).map(CellKind::is_walkable).unwrap_or(false)
    }

    /// In-bounds 4-directional neighbours (north, east, south, west).
    pub fn neighbors(&self, cell: Cell) -> Result<Vec<Cell>, GridError> {
        self.check(cell)?;
        Ok(cell
            .adjacent()
            .into_iter()
            .filter(|n| self.contains(*n))
            .collect())
    }

    /// Walkable 4-directional neighbours in the same fixed order.
    pub fn walkable_neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        cell.adjacent().into_iter().filter(|n| self.walkable(*n))
    }

    pub fn manhattan_distance(&self, a: Cell, b: Cell) -> Result<u32, GridError> {
        self.check(a)?;
        self.check(b)?;
        Ok(a.manhattan(b))
    }

    /// Place a dynamic obstacle. Returns `false` when the cell was not free
    /// (walls and existing obstacles are left as they are).
    pub fn add_obstacle(&mut self, cell: Cell) -> Result<bool, GridError> {
        let idx = self.index(cell)?;
        if self.kinds[idx] == CellKind::Free {
            self.kinds[idx] = CellKind::Obstacle;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Remove an obstacle. Returns `false` when the cell held no obstacle.
    pub fn clear_obstacle(&mut self, cell: Cell) -> Result<bool, GridError> {
        let idx = self.index(cell)?;
        if self.kinds[idx] == CellKind::Obstacle {
            self.kinds[idx] = CellKind::Free;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Number of walkable cells.
    pub fn walkable_count(&self) -> usize {
        self.kinds.iter().filter(|k| k.is_walkable()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walled_grid_border() {
        let grid = GridMap::walled(5, 5);
        assert!(!grid.walkable(Cell::new(0, 2)));
        assert!(!grid.walkable(Cell::new(4, 4)));
        assert!(grid.walkable(Cell::new(2, 2)));
        assert_eq!(grid.walkable_count(), 9);
    }

    #[test]
    fn test_out_of_bounds_query_fails() {
        let grid = GridMap::new(3, 3);
        let err = grid.is_walkable(Cell::new(3, 0)).unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds { rows: 3, cols: 3, .. }));
        assert!(grid.is_walkable(Cell::new(-1, 0)).is_err());
        assert!(grid.neighbors(Cell::new(0, 7)).is_err());
        assert!(grid.manhattan_distance(Cell::new(0, 0), Cell::new(9, 9)).is_err());
    }

    #[test]
    fn test_neighbors_are_bounded() {
        let grid = GridMap::new(3, 3);
        assert_eq!(
            grid.neighbors(Cell::new(0, 0)).unwrap(),
            vec![Cell::new(0, 1), Cell::new(1, 0)]
        );
        assert_eq!(grid.neighbors(Cell::new(1, 1)).unwrap().len(), 4);
    }

    #[test]
    fn test_walkable_neighbors_skip_walls() {
        let grid = GridMap::walled(4, 4);
        let n: Vec<_> = grid.walkable_neighbors(Cell::new(1, 1)).collect();
        assert_eq!(n, vec![Cell::new(1, 2), Cell::new(2, 1)]);
    }

    #[test]
    fn test_manhattan() {
        assert_eq!(Cell::new(1, 1).manhattan(Cell::new(13, 13)), 24);
        assert_eq!(Cell::new(4, 2).manhattan(Cell::new(1, 5)), 6);
    }

    #[test]
    fn test_dynamic_obstacles() {
        let mut grid = GridMap::walled(5, 5);
        let c = Cell::new(2, 2);
        assert!(grid.add_obstacle(c).unwrap());
        assert!(!grid.walkable(c));
        assert!(!grid.add_obstacle(c).unwrap());
        assert!(!grid.add_obstacle(Cell::new(0, 0)).unwrap()); // wall stays a wall
        assert!(grid.clear_obstacle(c).unwrap());
        assert!(grid.walkable(c));
        assert!(!grid.clear_obstacle(Cell::new(0, 0)).unwrap());
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let rows = vec![
            vec![CellKind::Free, CellKind::Free],
            vec![CellKind::Free],
        ];
        assert_eq!(
            GridMap::from_rows(rows).unwrap_err(),
            GridError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            }
        );
        assert_eq!(GridMap::from_rows(vec![]).unwrap_err(), GridError::EmptyFloor);
    }
}
