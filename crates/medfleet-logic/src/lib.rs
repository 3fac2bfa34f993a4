//! Pure decision logic for MedFleet.
//!
//! This crate contains every planning and scoring rule of the delivery fleet
//! with no engine, storage or runtime attached. Functions take plain data and
//! return results, making them unit-testable and usable from the simulation
//! engine, the headless harness and benchmarks alike.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`battery`] | Remaining range, charge time and health estimates |
//! | [`charging`] | Fuzzy and threshold-table charging priority, advisor |
//! | [`config`] | Startup configuration, defaults, validation |
//! | [`floor`] | Floor-plan symbol parsing and the demo hospital floor |
//! | [`grid`] | Cells, walkability, neighbours, dynamic obstacles |
//! | [`model`] | Ids, urgency, task kinds, robot and task statuses |
//! | [`pathfinding`] | A* search, routes, path optimizer and metrics |
//! | [`ranking`] | Robot ranking for task assignment |
//! | [`reservation`] | Space-time reservation table and schedules |

pub mod battery;
pub mod charging;
pub mod config;
pub mod floor;
pub mod grid;
pub mod model;
pub mod pathfinding;
pub mod ranking;
pub mod reservation;
