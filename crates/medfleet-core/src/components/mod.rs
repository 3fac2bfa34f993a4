//! Component definitions for the ECS simulation.
//!
//! Robot components are pure data attached to robot entities. Tasks are
//! plain records owned by the [`TaskQueue`]; behaviour lives in systems.

mod robot;
mod task;

pub use robot::*;
pub use task::*;
