//! A* pathfinding over grid cells, plus the lossless path optimizer.
//!
//! Search uses unit step cost and the Manhattan heuristic, which is admissible
//! and consistent on a 4-connected unit grid, so the first time the goal is
//! popped its route is a shortest one. The open set is ordered by `f`, then
//! by smaller `h`, then by insertion order, which makes repeated searches on
//! the same grid return identical routes.
//!
//! The optimizer collapses straight runs to their end points. Re-expanding the
//! waypoints yields the raw cell walk exactly.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, GridError, GridMap};

/// Default cap on A* node expansions.
pub const DEFAULT_NODE_BUDGET: usize = 10_000;

/// Errors raised while planning or assembling routes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error(transparent)]
    Grid(#[from] GridError),

    /// No walkable route exists.
    #[error("no path found from {start} to {goal}")]
    PathNotFound { start: Cell, goal: Cell },

    /// The search hit its node budget before reaching the goal.
    #[error("search from {start} to {goal} gave up after expanding {expanded} nodes")]
    SearchBudgetExhausted {
        start: Cell,
        goal: Cell,
        expanded: usize,
    },

    /// Two consecutive waypoints do not share a row or column.
    #[error("waypoints {from} and {to} are not on a shared row or column")]
    DisjointWaypoints { from: Cell, to: Cell },

    /// A cell sequence has a gap (consecutive cells not adjacent).
    #[error("route is discontinuous between {from} and {to}")]
    Discontinuous { from: Cell, to: Cell },

    /// A route with no cells.
    #[error("route has no cells")]
    EmptyRoute,

    /// Two legs do not meet end to start.
    #[error("cannot join a route ending at {end} to one starting at {start}")]
    JoinMismatch { end: Cell, start: Cell },
}

impl PathError {
    /// `true` for the "no walkable route" family (including budget exhaustion).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PathError::PathNotFound { .. } | PathError::SearchBudgetExhausted { .. }
        )
    }
}

/// A cell-by-cell walk from start to goal. Consecutive cells are adjacent
/// and there is always at least one cell; deserializing checks both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Cell>", into = "Vec<Cell>")]
pub struct Route {
    cells: Vec<Cell>,
}

impl TryFrom<Vec<Cell>> for Route {
    type Error = PathError;

    fn try_from(cells: Vec<Cell>) -> Result<Self, Self::Error> {
        Route::from_cells(cells)
    }
}

impl From<Route> for Vec<Cell> {
    fn from(route: Route) -> Self {
        route.cells
    }
}

impl Route {
    /// A zero-length route that stays on one cell.
    pub fn stationary(cell: Cell) -> Self {
        Self { cells: vec![cell] }
    }

    /// Build a route from a cell walk, checking adjacency.
    pub fn from_cells(cells: Vec<Cell>) -> Result<Self, PathError> {
        if cells.is_empty() {
            return Err(PathError::EmptyRoute);
        }
        for pair in cells.windows(2) {
            if pair[0].manhattan(pair[1]) != 1 {
                return Err(PathError::Discontinuous {
                    from: pair[0],
                    to: pair[1],
                });
            }
        }
        Ok(Self { cells })
    }

    /// Re-expand an optimized waypoint list into the full walk.
    pub fn from_waypoints(waypoints: &[Cell]) -> Result<Self, PathError> {
        Self::from_cells(expand_waypoints(waypoints)?)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn start(&self) -> Cell {
        self.cells[0]
    }

    pub fn goal(&self) -> Cell {
        self.cells[self.cells.len() - 1]
    }

    /// Number of moves (cells minus one).
    pub fn steps(&self) -> usize {
        self.cells.len() - 1
    }

    /// Direction-change points plus both end points.
    pub fn waypoints(&self) -> Vec<Cell> {
        optimize_path(&self.cells)
    }

    pub fn metrics(&self) -> PathMetrics {
        PathMetrics::of(&self.cells)
    }

    /// Append `next`, which must start where `self` ends. The shared cell
    /// appears once.
    pub fn join(mut self, next: Route) -> Result<Route, PathError> {
        if self.goal() != next.start() {
            return Err(PathError::JoinMismatch {
                end: self.goal(),
                start: next.start(),
            });
        }
        self.cells.extend_from_slice(&next.cells[1..]);
        Ok(self)
    }
}

/// Summary figures for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMetrics {
    /// Moves made. Equals the Manhattan distance on an open floor.
    pub length: usize,
    /// Cells visited, including both ends.
    pub cells: usize,
    /// Unit step cost summed over the moves.
    pub cost: usize,
    pub turns: usize,
    pub straight_segments: usize,
}

impl PathMetrics {
    pub fn of(cells: &[Cell]) -> Self {
        let waypoints = optimize_path(cells).len();
        Self {
            length: cells.len().saturating_sub(1),
            cells: cells.len(),
            cost: cells.len().saturating_sub(1),
            turns: waypoints.saturating_sub(2),
            straight_segments: waypoints.saturating_sub(1),
        }
    }
}

/// Keep end points and cells where the step direction changes.
pub fn optimize_path(cells: &[Cell]) -> Vec<Cell> {
    if cells.len() <= 2 {
        return cells.to_vec();
    }
    let mut out = Vec::with_capacity(cells.len());
    out.push(cells[0]);
    for w in cells.windows(3) {
        if w[0].direction_to(w[1]) != w[1].direction_to(w[2]) {
            out.push(w[1]);
        }
    }
    out.push(cells[cells.len() - 1]);
    out
}

/// Expand straight segments between waypoints back into single-cell steps.
pub fn expand_waypoints(waypoints: &[Cell]) -> Result<Vec<Cell>, PathError> {
    let Some(&first) = waypoints.first() else {
        return Ok(Vec::new());
    };
    let mut out = vec![first];
    for pair in waypoints.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        if from.row != to.row && from.col != to.col {
            return Err(PathError::DisjointWaypoints { from, to });
        }
        let (dr, dc) = from.direction_to(to);
        let mut cur = from;
        while cur != to {
            cur = Cell::new(cur.row + dr, cur.col + dc);
            out.push(cur);
        }
    }
    Ok(out)
}

/// Open-set entry. `BinaryHeap` is a max-heap, so the ordering is reversed:
/// the "greatest" node has the smallest `f`, then smallest `h`, then the
/// earliest insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    f: u32,
    h: u32,
    seq: u64,
    cell: Cell,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* search over a borrowed grid.
#[derive(Debug, Clone, Copy)]
pub struct Pathfinder<'a> {
    grid: &'a GridMap,
    node_budget: usize,
}

impl<'a> Pathfinder<'a> {
    pub fn new(grid: &'a GridMap) -> Self {
        Self {
            grid,
            node_budget: DEFAULT_NODE_BUDGET,
        }
    }

    /// Cap the number of node expansions before giving up.
    pub fn with_node_budget(mut self, budget: usize) -> Self {
        self.node_budget = budget.max(1);
        self
    }

    pub fn grid(&self) -> &'a GridMap {
        self.grid
    }

    /// Shortest walkable route from `start` to `goal`.
    pub fn find_path(&self, start: Cell, goal: Cell) -> Result<Route, PathError> {
        self.find_path_avoiding(start, goal, &HashSet::new())
    }

    /// Shortest route that also treats `avoid` cells as blocked. The start
    /// cell is never blocked; it is where the walker already stands.
    pub fn find_path_avoiding(
        &self,
        start: Cell,
        goal: Cell,
        avoid: &HashSet<Cell>,
    ) -> Result<Route, PathError> {
        self.grid.check(start)?;
        self.grid.check(goal)?;

        if start == goal {
            return Ok(Route::stationary(start));
        }
        if !self.grid.walkable(goal) || avoid.contains(&goal) {
            return Err(PathError::PathNotFound { start, goal });
        }

        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<Cell, u32> = HashMap::new();
        let mut came_from: HashMap<Cell, Cell> = HashMap::new();
        let mut closed: HashSet<Cell> = HashSet::new();
        let mut seq = 0u64;
        let mut expanded = 0usize;

        let h0 = start.manhattan(goal);
        g_score.insert(start, 0);
        open.push(OpenNode {
            f: h0,
            h: h0,
            seq,
            cell: start,
        });

        while let Some(node) = open.pop() {
            if closed.contains(&node.cell) {
                continue;
            }
            if node.cell == goal {
                return Ok(Route {
                    cells: reconstruct(&came_from, goal),
                });
            }
            if expanded >= self.node_budget {
                return Err(PathError::SearchBudgetExhausted {
                    start,
                    goal,
                    expanded,
                });
            }
            closed.insert(node.cell);
            expanded += 1;

            let g = g_score[&node.cell];
            for next in self.grid.walkable_neighbors(node.cell) {
                if closed.contains(&next) || avoid.contains(&next) {
                    continue;
                }
                let tentative = g + 1;
                if tentative < g_score.get(&next).copied().unwrap_or(u32::MAX) {
                    g_score.insert(next, tentative);
                    came_from.insert(next, node.cell);
                    let h = next.manhattan(goal);
                    seq += 1;
                    open.push(OpenNode {
                        f: tentative + h,
                        h,
                        seq,
                        cell: next,
                    });
                }
            }
        }

        Err(PathError::PathNotFound { start, goal })
    }
}

fn reconstruct(came_from: &HashMap<Cell, Cell>, goal: Cell) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut node = goal;
    while let Some(&prev) = came_from.get(&node) {
        path.push(prev);
        node = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floor::{FloorPlan, HOSPITAL_FLOOR};

    fn c(row: i32, col: i32) -> Cell {
        Cell::new(row, col)
    }

    #[test]
    fn test_same_cell() {
        let grid = GridMap::walled(5, 5);
        let route = Pathfinder::new(&grid).find_path(c(2, 2), c(2, 2)).unwrap();
        assert_eq!(route.cells(), &[c(2, 2)]);
        assert_eq!(route.steps(), 0);
    }

    #[test]
    fn test_open_grid_is_manhattan() {
        let grid = GridMap::walled(15, 15);
        let route = Pathfinder::new(&grid).find_path(c(1, 1), c(13, 13)).unwrap();
        assert_eq!(route.steps(), 24);
        assert_eq!(route.start(), c(1, 1));
        assert_eq!(route.goal(), c(13, 13));
    }

    #[test]
    fn test_detours_around_wall() {
        // #######
        // #  #  #
        // #  #  #
        // #     #
        // #######
        let mut grid = GridMap::walled(5, 7);
        grid.add_obstacle(c(1, 3)).unwrap();
        grid.add_obstacle(c(2, 3)).unwrap();
        let route = Pathfinder::new(&grid).find_path(c(1, 1), c(1, 5)).unwrap();
        assert_eq!(route.steps(), 8);
        assert!(route.cells().contains(&c(3, 3)));
    }

    #[test]
    fn test_goal_is_wall() {
        let grid = GridMap::walled(5, 5);
        let err = Pathfinder::new(&grid).find_path(c(1, 1), c(0, 0)).unwrap_err();
        assert_eq!(
            err,
            PathError::PathNotFound {
                start: c(1, 1),
                goal: c(0, 0)
            }
        );
    }

    #[test]
    fn test_disconnected_regions() {
        let mut grid = GridMap::walled(5, 7);
        for r in 1..4 {
            grid.add_obstacle(c(r, 3)).unwrap();
        }
        let err = Pathfinder::new(&grid).find_path(c(1, 1), c(3, 5)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_out_of_bounds_goal() {
        let grid = GridMap::walled(5, 5);
        let err = Pathfinder::new(&grid).find_path(c(1, 1), c(9, 9)).unwrap_err();
        assert!(matches!(err, PathError::Grid(GridError::OutOfBounds { .. })));
    }

    #[test]
    fn test_node_budget() {
        let grid = GridMap::walled(40, 40);
        let err = Pathfinder::new(&grid)
            .with_node_budget(5)
            .find_path(c(1, 1), c(38, 38))
            .unwrap_err();
        assert_eq!(
            err,
            PathError::SearchBudgetExhausted {
                start: c(1, 1),
                goal: c(38, 38),
                expanded: 5
            }
        );
    }

    #[test]
    fn test_avoid_set_forces_detour() {
        let grid = GridMap::walled(5, 7);
        let finder = Pathfinder::new(&grid);
        let direct = finder.find_path(c(2, 1), c(2, 5)).unwrap();
        assert_eq!(direct.steps(), 4);
        let avoid: HashSet<Cell> = [c(2, 3)].into_iter().collect();
        let detour = finder.find_path_avoiding(c(2, 1), c(2, 5), &avoid).unwrap();
        assert_eq!(detour.steps(), 6);
        assert!(!detour.cells().contains(&c(2, 3)));
    }

    #[test]
    fn test_repeatable() {
        let plan = FloorPlan::parse(&HOSPITAL_FLOOR).unwrap();
        let finder = Pathfinder::new(&plan.grid);
        let a = finder.find_path(c(13, 1), c(3, 12)).unwrap();
        let b = finder.find_path(c(13, 1), c(3, 12)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.waypoints(), b.waypoints());
    }

    #[test]
    fn test_optimize_keeps_turns() {
        let cells = vec![c(1, 1), c(1, 2), c(1, 3), c(2, 3), c(3, 3), c(3, 4)];
        assert_eq!(
            optimize_path(&cells),
            vec![c(1, 1), c(1, 3), c(3, 3), c(3, 4)]
        );
        assert_eq!(expand_waypoints(&optimize_path(&cells)).unwrap(), cells);
    }

    #[test]
    fn test_optimize_short_paths() {
        assert!(optimize_path(&[]).is_empty());
        assert_eq!(optimize_path(&[c(1, 1)]), vec![c(1, 1)]);
        assert_eq!(optimize_path(&[c(1, 1), c(1, 2)]), vec![c(1, 1), c(1, 2)]);
    }

    #[test]
    fn test_expand_rejects_diagonal() {
        let err = expand_waypoints(&[c(1, 1), c(2, 2)]).unwrap_err();
        assert_eq!(
            err,
            PathError::DisjointWaypoints {
                from: c(1, 1),
                to: c(2, 2)
            }
        );
    }

    #[test]
    fn test_metrics() {
        let route =
            Route::from_cells(vec![c(1, 1), c(1, 2), c(1, 3), c(2, 3), c(3, 3), c(3, 4)]).unwrap();
        let m = route.metrics();
        assert_eq!(m.length, 5);
        assert_eq!(m.cells, 6);
        assert_eq!(m.cost, 5);
        assert_eq!(m.turns, 2);
        assert_eq!(m.straight_segments, 3);
    }

    #[test]
    fn test_deserialize_checks_cells() {
        let route = Route::from_cells(vec![c(1, 1), c(1, 2)]).unwrap();
        let json = serde_json::to_string(&route).unwrap();
        assert_eq!(serde_json::from_str::<Route>(&json).unwrap(), route);

        assert!(serde_json::from_str::<Route>("[]").is_err());
        let gap = serde_json::to_string(&vec![c(1, 1), c(1, 3)]).unwrap();
        assert!(serde_json::from_str::<Route>(&gap).is_err());
    }

    #[test]
    fn test_from_cells_rejects_gaps() {
        assert_eq!(Route::from_cells(vec![]).unwrap_err(), PathError::EmptyRoute);
        assert!(matches!(
            Route::from_cells(vec![c(1, 1), c(1, 3)]).unwrap_err(),
            PathError::Discontinuous { .. }
        ));
    }

    #[test]
    fn test_join_legs() {
        let a = Route::from_cells(vec![c(1, 1), c(1, 2)]).unwrap();
        let b = Route::from_cells(vec![c(1, 2), c(2, 2)]).unwrap();
        let joined = a.clone().join(b).unwrap();
        assert_eq!(joined.cells(), &[c(1, 1), c(1, 2), c(2, 2)]);
        let bad = Route::stationary(c(5, 5));
        assert!(matches!(
            a.join(bad).unwrap_err(),
            PathError::JoinMismatch { .. }
        ));
    }
}
