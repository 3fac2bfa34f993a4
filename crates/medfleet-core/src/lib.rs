//! MedFleet Core - Hospital Delivery Fleet Simulation Engine
//!
//! A tick-driven simulation of autonomous delivery robots moving medicine,
//! samples and supplies around a hospital floor.
//!
//! # Architecture
//!
//! Robots are `hecs` entities indexed by a stable [`RobotId`](medfleet_logic::model::RobotId):
//! - **Components**: pure robot data (Position, Battery, Duty, Travel, ...)
//! - **Systems**: movement, docking, charging advice and dispatch, run in
//!   that order once per tick
//! - **State**: the world plus the grid, task queue and reservation table
//!   the systems share
//!
//! Planning decisions (A*, reservations, ranking, charging advice) live in
//! `medfleet-logic`; this crate only sequences them.
//!
//! # Example
//!
//! ```rust
//! use medfleet_core::prelude::*;
//!
//! let mut engine = SimulationEngine::new(SimConfig::default()).unwrap();
//! for _ in 0..50 {
//!     for event in engine.tick() {
//!         println!("{:?}", event);
//!     }
//! }
//! assert_eq!(engine.current_tick(), 50);
//! ```

pub mod components;
pub mod engine;
pub mod generation;
pub mod persistence;
pub mod state;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{FleetStats, RobotView, SimError, SimSnapshot, SimulationEngine};
    pub use crate::systems::{AbortReason, SimEvent};
    pub use medfleet_logic::config::SimConfig;
    pub use medfleet_logic::grid::Cell;
    pub use medfleet_logic::model::{RobotStatus, TaskKind, TaskRequest, TaskStatus, Urgency};
}
