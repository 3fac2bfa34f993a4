//! Property tests for the planning stack.
//!
//! Exercises: random GridMap → Pathfinder (checked against BFS)
//! → optimize_path / expand_waypoints → ReservationTable commits.

use std::collections::{HashSet, VecDeque};

use medfleet_logic::floor::{FloorPlan, HOSPITAL_FLOOR};
use medfleet_logic::grid::{Cell, CellKind, GridMap};
use medfleet_logic::pathfinding::{expand_waypoints, optimize_path, PathError, Pathfinder};
use medfleet_logic::reservation::{ReservationTable, Schedule};
use proptest::prelude::*;

// ── Helpers ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Scenario {
    grid: GridMap,
    start: Cell,
    goal: Cell,
}

/// Small grids with roughly a quarter of the cells blocked. Start and goal
/// are always free.
fn arb_scenario() -> impl Strategy<Value = Scenario> {
    (3usize..12, 3usize..12)
        .prop_flat_map(|(rows, cols)| {
            (
                Just((rows, cols)),
                proptest::collection::vec(proptest::bool::weighted(0.25), rows * cols),
                0..rows,
                0..cols,
                0..rows,
                0..cols,
            )
        })
        .prop_map(|((rows, cols), blocked, sr, sc, gr, gc)| {
            let start = Cell::new(sr as i32, sc as i32);
            let goal = Cell::new(gr as i32, gc as i32);
            let kinds = (0..rows)
                .map(|r| {
                    (0..cols)
                        .map(|c| {
                            let cell = Cell::new(r as i32, c as i32);
                            if blocked[r * cols + c] && cell != start && cell != goal {
                                CellKind::Obstacle
                            } else {
                                CellKind::Free
                            }
                        })
                        .collect()
                })
                .collect();
            Scenario {
                grid: GridMap::from_rows(kinds).unwrap(),
                start,
                goal,
            }
        })
}

/// Shortest step count by exhaustive breadth-first search.
fn bfs_steps(grid: &GridMap, start: Cell, goal: Cell) -> Option<usize> {
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([(start, 0usize)]);
    while let Some((cell, dist)) = queue.pop_front() {
        if cell == goal {
            return Some(dist);
        }
        for next in grid.walkable_neighbors(cell) {
            if seen.insert(next) {
                queue.push_back((next, dist + 1));
            }
        }
    }
    None
}

// ── Properties ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn astar_is_as_short_as_bfs(s in arb_scenario()) {
        let finder = Pathfinder::new(&s.grid);
        match (finder.find_path(s.start, s.goal), bfs_steps(&s.grid, s.start, s.goal)) {
            (Ok(route), Some(steps)) => prop_assert_eq!(route.steps(), steps),
            (Err(PathError::PathNotFound { .. }), None) => {}
            (found, steps) => prop_assert!(false, "A* {:?} but BFS {:?}", found, steps),
        }
    }

    #[test]
    fn astar_is_deterministic(s in arb_scenario()) {
        let finder = Pathfinder::new(&s.grid);
        let first = finder.find_path(s.start, s.goal);
        let second = finder.find_path(s.start, s.goal);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn routes_walk_adjacent_walkable_cells(s in arb_scenario()) {
        let finder = Pathfinder::new(&s.grid);
        if let Ok(route) = finder.find_path(s.start, s.goal) {
            prop_assert_eq!(route.start(), s.start);
            prop_assert_eq!(route.goal(), s.goal);
            for pair in route.cells().windows(2) {
                prop_assert_eq!(pair[0].manhattan(pair[1]), 1);
                prop_assert!(s.grid.walkable(pair[1]));
            }
        }
    }

    #[test]
    fn optimizer_is_idempotent_and_lossless(s in arb_scenario()) {
        let finder = Pathfinder::new(&s.grid);
        if let Ok(route) = finder.find_path(s.start, s.goal) {
            let waypoints = optimize_path(route.cells());
            prop_assert_eq!(optimize_path(&waypoints), waypoints.clone());
            prop_assert_eq!(expand_waypoints(&waypoints).unwrap(), route.cells().to_vec());
            prop_assert!(waypoints.len() <= route.cells().len());
        }
    }

    #[test]
    fn failed_commit_leaves_table_unchanged(
        s in arb_scenario(),
        offset in 0u64..6,
        ticks_per_cell in 1u32..3,
    ) {
        let finder = Pathfinder::new(&s.grid);
        let (Ok(there), Ok(back)) = (
            finder.find_path(s.start, s.goal),
            finder.find_path(s.goal, s.start),
        ) else {
            return Ok(());
        };

        let mut table = ReservationTable::new();
        prop_assert!(table.commit(&s.grid, &there, 0, 1).is_ok());
        let before = table.clone();

        let schedule = Schedule::new(back, offset, ticks_per_cell);
        match table.commit_schedule(&s.grid, &schedule, 2) {
            Err(_) => prop_assert_eq!(&table, &before),
            Ok(held) => {
                prop_assert_eq!(table.len(), before.len() + held);
                prop_assert_eq!(table.held_by(1), before.held_by(1));
            }
        }
    }
}

// ── Fixed scenarios ────────────────────────────────────────────────────

#[test]
fn hospital_routes_are_shortest() {
    let plan = FloorPlan::parse(&HOSPITAL_FLOOR).unwrap();
    let finder = Pathfinder::new(&plan.grid);
    let pickup = plan.pickups[0];
    for &dropoff in &plan.dropoffs {
        let route = finder.find_path(pickup, dropoff).unwrap();
        assert_eq!(
            Some(route.steps()),
            bfs_steps(&plan.grid, pickup, dropoff),
            "pickup -> {dropoff}"
        );
    }
    for (&id, &start) in &plan.robot_starts {
        for &station in &plan.stations {
            let route = finder.find_path(start, station).unwrap();
            assert_eq!(
                Some(route.steps()),
                bfs_steps(&plan.grid, start, station),
                "R{id} -> {station}"
            );
        }
    }
}

#[test]
fn open_floor_route_is_manhattan() {
    let grid = GridMap::walled(15, 15);
    let route = Pathfinder::new(&grid)
        .find_path(Cell::new(1, 1), Cell::new(13, 13))
        .unwrap();
    assert_eq!(route.steps(), 24);
    let metrics = route.metrics();
    assert_eq!(metrics.length, 24);
    assert_eq!(metrics.cells, 25);
    assert_eq!(metrics.cost, 24);
}
