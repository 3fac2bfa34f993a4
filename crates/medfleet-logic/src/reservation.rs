//! Space-time reservations: which robot holds which cell at which tick.
//!
//! A route is turned into a [`Schedule`] (one cell per `ticks_per_cell`
//! ticks, optionally waiting on the start cell first). [`ReservationTable::commit_schedule`]
//! checks every `(cell, tick)` pair, plus head-on swaps between consecutive
//! ticks, before inserting anything, so a failed commit leaves the table
//! untouched.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, GridError, GridMap};
use crate::model::{RobotId, Tick};
use crate::pathfinding::Route;

/// One held `(cell, tick)` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reservation {
    pub cell: Cell,
    pub tick: Tick,
    pub robot: RobotId,
}

/// Why a commit was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationError {
    /// Another robot already holds a slot the route needs.
    #[error("robot {conflicting_robot} holds {cell} at tick {tick}")]
    Conflict {
        conflicting_robot: RobotId,
        cell: Cell,
        tick: Tick,
    },

    /// The route crosses a wall or obstacle.
    #[error("cell {cell} is not walkable (needed at tick {tick})")]
    Blocked { cell: Cell, tick: Tick },

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// A route pinned to the clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    route: Route,
    ready_tick: Tick,
    depart_tick: Tick,
    ticks_per_cell: u32,
}

impl Schedule {
    /// Start on `route.start()` at `depart_tick`, spending `ticks_per_cell`
    /// ticks per cell.
    pub fn new(route: Route, depart_tick: Tick, ticks_per_cell: u32) -> Self {
        Self {
            route,
            ready_tick: depart_tick,
            depart_tick,
            ticks_per_cell: ticks_per_cell.max(1),
        }
    }

    /// Hold the start cell from `ready_tick` until departure.
    pub fn waiting_from(mut self, ready_tick: Tick) -> Self {
        self.ready_tick = ready_tick.min(self.depart_tick);
        self
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn into_route(self) -> Route {
        self.route
    }

    pub fn depart_tick(&self) -> Tick {
        self.depart_tick
    }

    pub fn ticks_per_cell(&self) -> u32 {
        self.ticks_per_cell
    }

    /// Tick at which the walker enters `route.cells()[index]`.
    pub fn arrival_tick(&self, index: usize) -> Tick {
        self.depart_tick + index as Tick * self.ticks_per_cell as Tick
    }

    /// Tick at which the walker reaches the goal.
    pub fn finish_tick(&self) -> Tick {
        self.arrival_tick(self.route.steps())
    }

    /// Every `(cell, tick)` the walker occupies. Intermediate cells are held
    /// for `ticks_per_cell` ticks; the goal only at the arrival tick.
    pub fn occupancy(&self) -> Vec<(Cell, Tick)> {
        let cells = self.route.cells();
        let k = self.ticks_per_cell as Tick;
        let mut out = Vec::with_capacity(cells.len() * k as usize + 1);
        for tick in self.ready_tick..self.depart_tick {
            out.push((cells[0], tick));
        }
        let last = cells.len() - 1;
        for (i, &cell) in cells.iter().enumerate() {
            let arrive = self.arrival_tick(i);
            let hold = if i == last { 1 } else { k };
            for dt in 0..hold {
                out.push((cell, arrive + dt));
            }
        }
        out
    }
}

/// The `(cell, tick) → robot` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationTable {
    slots: BTreeMap<(Tick, Cell), RobotId>,
    by_robot: BTreeMap<RobotId, BTreeSet<(Tick, Cell)>>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a table from previously listed entries.
    pub fn from_entries(entries: impl IntoIterator<Item = Reservation>) -> Self {
        let mut table = Self::new();
        for r in entries {
            table.insert(r.cell, r.tick, r.robot);
        }
        table
    }

    /// Reserve `route` one cell per tick from `start_tick`.
    pub fn commit(
        &mut self,
        grid: &GridMap,
        route: &Route,
        start_tick: Tick,
        robot: RobotId,
    ) -> Result<usize, ReservationError> {
        self.commit_schedule(grid, &Schedule::new(route.clone(), start_tick, 1), robot)
    }

    /// Reserve every slot of `schedule` for `robot`, or nothing at all.
    /// Returns the number of slots held.
    pub fn commit_schedule(
        &mut self,
        grid: &GridMap,
        schedule: &Schedule,
        robot: RobotId,
    ) -> Result<usize, ReservationError> {
        let occupancy = schedule.occupancy();
        let start = schedule.route().start();

        for &(cell, tick) in &occupancy {
            grid.check(cell)?;
            if cell != start && !grid.walkable(cell) {
                return Err(ReservationError::Blocked { cell, tick });
            }
            if let Some(holder) = self.holder(cell, tick) {
                if holder != robot {
                    return Err(ReservationError::Conflict {
                        conflicting_robot: holder,
                        cell,
                        tick,
                    });
                }
            }
        }

        // Head-on swaps: another robot moving `to → from` while we move
        // `from → to` never shares a (cell, tick) pair but still collides.
        let cells = schedule.route().cells();
        for (i, pair) in cells.windows(2).enumerate() {
            let (from, to) = (pair[0], pair[1]);
            let enter = schedule.arrival_tick(i + 1);
            if let Some(other) = self.holder(to, enter - 1) {
                if other != robot && self.holder(from, enter) == Some(other) {
                    return Err(ReservationError::Conflict {
                        conflicting_robot: other,
                        cell: to,
                        tick: enter,
                    });
                }
            }
        }

        for &(cell, tick) in &occupancy {
            self.insert(cell, tick, robot);
        }
        Ok(occupancy.len())
    }

    fn insert(&mut self, cell: Cell, tick: Tick, robot: RobotId) {
        if let Some(prev) = self.slots.insert((tick, cell), robot) {
            if prev != robot {
                if let Some(set) = self.by_robot.get_mut(&prev) {
                    set.remove(&(tick, cell));
                }
            }
        }
        self.by_robot.entry(robot).or_default().insert((tick, cell));
    }

    /// Drop every slot held by `robot`. Returns how many were released.
    pub fn release(&mut self, robot: RobotId) -> usize {
        let Some(held) = self.by_robot.remove(&robot) else {
            return 0;
        };
        for key in &held {
            self.slots.remove(key);
        }
        held.len()
    }

    /// Drop all slots strictly before `tick`; they are in the past.
    pub fn expire_before(&mut self, tick: Tick) -> usize {
        let keep = self.slots.split_off(&(tick, Cell::new(i32::MIN, i32::MIN)));
        let stale = std::mem::replace(&mut self.slots, keep);
        for (key, robot) in &stale {
            if let Some(set) = self.by_robot.get_mut(robot) {
                set.remove(key);
                if set.is_empty() {
                    self.by_robot.remove(robot);
                }
            }
        }
        stale.len()
    }

    pub fn holder(&self, cell: Cell, tick: Tick) -> Option<RobotId> {
        self.slots.get(&(tick, cell)).copied()
    }

    /// Number of slots held by `robot`.
    pub fn held_by(&self, robot: RobotId) -> usize {
        self.by_robot.get(&robot).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Copy of every slot, ordered by tick then cell.
    pub fn entries(&self) -> Vec<Reservation> {
        self.slots
            .iter()
            .map(|(&(tick, cell), &robot)| Reservation { cell, tick, robot })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(row: i32, col: i32) -> Cell {
        Cell::new(row, col)
    }

    fn row_route(row: i32, from: i32, to: i32) -> Route {
        let step = if to >= from { 1 } else { -1 };
        let mut cells = vec![c(row, from)];
        let mut col = from;
        while col != to {
            col += step;
            cells.push(c(row, col));
        }
        Route::from_cells(cells).unwrap()
    }

    fn col_route(col: i32, from: i32, to: i32) -> Route {
        let step = if to >= from { 1 } else { -1 };
        let mut cells = vec![c(from, col)];
        let mut row = from;
        while row != to {
            row += step;
            cells.push(c(row, col));
        }
        Route::from_cells(cells).unwrap()
    }

    #[test]
    fn test_schedule_occupancy() {
        let s = Schedule::new(row_route(1, 1, 3), 10, 2).waiting_from(8);
        assert_eq!(
            s.occupancy(),
            vec![
                (c(1, 1), 8),
                (c(1, 1), 9),
                (c(1, 1), 10),
                (c(1, 1), 11),
                (c(1, 2), 12),
                (c(1, 2), 13),
                (c(1, 3), 14),
            ]
        );
        assert_eq!(s.finish_tick(), 14);
    }

    #[test]
    fn test_commit_and_release() {
        let grid = GridMap::walled(7, 7);
        let mut table = ReservationTable::new();
        let held = table.commit(&grid, &row_route(1, 1, 5), 0, 1).unwrap();
        assert_eq!(held, 5);
        assert_eq!(table.holder(c(1, 3), 2), Some(1));
        assert_eq!(table.holder(c(1, 3), 3), None);
        assert_eq!(table.release(1), 5);
        assert!(table.is_empty());
        assert_eq!(table.release(1), 0);
    }

    #[test]
    fn test_crossing_conflict_names_cell_and_tick() {
        let grid = GridMap::walled(9, 9);
        let mut table = ReservationTable::new();
        table.commit(&grid, &col_route(4, 1, 7), 0, 1).unwrap();
        let err = table.commit(&grid, &row_route(4, 1, 7), 0, 2).unwrap_err();
        assert_eq!(
            err,
            ReservationError::Conflict {
                conflicting_robot: 1,
                cell: c(4, 4),
                tick: 3
            }
        );
        // One tick later the crossing is clear.
        assert!(table.commit(&grid, &row_route(4, 1, 7), 1, 2).is_ok());
    }

    #[test]
    fn test_failed_commit_leaves_table_unchanged() {
        let grid = GridMap::walled(9, 9);
        let mut table = ReservationTable::new();
        table.commit(&grid, &col_route(4, 1, 7), 0, 1).unwrap();
        let before = table.clone();
        assert!(table.commit(&grid, &row_route(4, 1, 7), 0, 2).is_err());
        assert_eq!(table, before);
        assert_eq!(table.held_by(2), 0);
    }

    #[test]
    fn test_head_on_swap_detected() {
        let grid = GridMap::walled(5, 7);
        let mut table = ReservationTable::new();
        // Robot 1 walks east along row 2, robot 2 walks west on the same row.
        table.commit(&grid, &row_route(2, 1, 4), 0, 1).unwrap();
        let err = table.commit(&grid, &row_route(2, 3, 2), 1, 2).unwrap_err();
        // Robot 1 is at (2,2) at t=1 and (2,3) at t=2; robot 2 is at (2,3)
        // at t=1 and wants (2,2) at t=2.
        assert!(matches!(
            err,
            ReservationError::Conflict {
                conflicting_robot: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_blocked_cell_rejected() {
        let mut grid = GridMap::walled(5, 7);
        grid.add_obstacle(c(2, 3)).unwrap();
        let mut table = ReservationTable::new();
        let route = Route::from_cells(vec![c(2, 2), c(2, 3), c(2, 4)]).unwrap();
        let err = table.commit(&grid, &route, 0, 1).unwrap_err();
        assert_eq!(
            err,
            ReservationError::Blocked {
                cell: c(2, 3),
                tick: 1
            }
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_same_robot_may_recommit() {
        let grid = GridMap::walled(5, 7);
        let mut table = ReservationTable::new();
        table.commit(&grid, &row_route(2, 1, 3), 0, 1).unwrap();
        assert!(table.commit(&grid, &row_route(2, 1, 3), 0, 1).is_ok());
        assert_eq!(table.held_by(1), 3);
    }

    #[test]
    fn test_expire_before() {
        let grid = GridMap::walled(5, 7);
        let mut table = ReservationTable::new();
        table.commit(&grid, &row_route(2, 1, 5), 0, 1).unwrap();
        assert_eq!(table.expire_before(2), 2);
        assert_eq!(table.len(), 3);
        assert_eq!(table.held_by(1), 3);
        assert_eq!(table.holder(c(2, 1), 0), None);
        assert_eq!(table.expire_before(100), 3);
        assert_eq!(table.held_by(1), 0);
    }

    #[test]
    fn test_entries_round_trip() {
        let grid = GridMap::walled(5, 7);
        let mut table = ReservationTable::new();
        table.commit(&grid, &row_route(2, 1, 5), 0, 1).unwrap();
        table.commit(&grid, &row_route(3, 5, 1), 0, 2).unwrap();
        let rebuilt = ReservationTable::from_entries(table.entries());
        assert_eq!(rebuilt, table);
    }
}
