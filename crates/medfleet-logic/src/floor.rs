//! Floor-plan parsing: rows of symbols into a `GridMap` plus landmarks.
//!
//! Legend:
//!
//! | Symbol | Meaning |
//! |--------|---------|
//! | `#` | Wall |
//! | `O` | Obstacle |
//! | ` ` / `.` | Free floor |
//! | `S` | Pickup point (free floor) |
//! | `D` | Drop-off point (free floor) |
//! | `C` | Charging station (free floor) |
//! | `R<digit>` | Robot start; both characters are free floor |
//!
//! ```
//! use medfleet_logic::floor::FloorPlan;
//! use medfleet_logic::grid::Cell;
//!
//! let plan = FloorPlan::parse(&["#####", "#R1 #", "#S C#", "#####"]).unwrap();
//! assert_eq!(plan.robot_starts[&1], Cell::new(1, 1));
//! assert_eq!(plan.stations, vec![Cell::new(2, 3)]);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, CellKind, GridError, GridMap};
use crate::model::RobotId;

/// A parsed floor plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorPlan {
    pub grid: GridMap,
    /// Robot id (marker digit) → start cell.
    pub robot_starts: BTreeMap<RobotId, Cell>,
    pub pickups: Vec<Cell>,
    pub dropoffs: Vec<Cell>,
    pub stations: Vec<Cell>,
}

impl FloorPlan {
    /// Parse symbol rows. Every row must have the same width.
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self, GridError> {
        let mut kinds = Vec::with_capacity(rows.len());
        let mut robot_starts = BTreeMap::new();
        let mut pickups = Vec::new();
        let mut dropoffs = Vec::new();
        let mut stations = Vec::new();

        for (r, line) in rows.iter().enumerate() {
            let symbols: Vec<char> = line.as_ref().chars().collect();
            let mut row = Vec::with_capacity(symbols.len());
            for (c, &symbol) in symbols.iter().enumerate() {
                let cell = Cell::new(r as i32, c as i32);
                let kind = match symbol {
                    '#' => CellKind::Wall,
                    'O' => CellKind::Obstacle,
                    ' ' | '.' => CellKind::Free,
                    'S' => {
                        pickups.push(cell);
                        CellKind::Free
                    }
                    'D' => {
                        dropoffs.push(cell);
                        CellKind::Free
                    }
                    'C' => {
                        stations.push(cell);
                        CellKind::Free
                    }
                    'R' => {
                        let digit = symbols.get(c + 1).and_then(|d| d.to_digit(10));
                        match digit {
                            Some(id) => {
                                robot_starts.insert(id, cell);
                                CellKind::Free
                            }
                            None => {
                                return Err(GridError::UnknownSymbol {
                                    row: r,
                                    col: c,
                                    symbol,
                                })
                            }
                        }
                    }
                    d if d.is_ascii_digit() && c > 0 && symbols[c - 1] == 'R' => CellKind::Free,
                    other => {
                        return Err(GridError::UnknownSymbol {
                            row: r,
                            col: c,
                            symbol: other,
                        })
                    }
                };
                row.push(kind);
            }
            kinds.push(row);
        }

        Ok(Self {
            grid: GridMap::from_rows(kinds)?,
            robot_starts,
            pickups,
            dropoffs,
            stations,
        })
    }
}

/// The demo hospital floor: 15×15, four robots, one pickup point, six
/// drop-off points and two charging stations.
pub const HOSPITAL_FLOOR: [&str; 15] = [
    "###############",
    "#C            #",
    "#         OOO #",
    "# OOO  D  O D #",
    "#   O  O  OOOO#",
    "#R2 O         #",
    "#OOOO  R4 OOO #",
    "#      D  O   #",
    "#     OOO O D #",
    "#         OOOO#",
    "#       R1    #",
    "#   R3 D      #",
    "#     OOO     #",
    "#S     O    DC#",
    "###############",
];
