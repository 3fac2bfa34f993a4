//! Systems - logic that runs once per tick, in this order:
//!
//! 1. [`movement_system`]: advance travelling robots, collect and deliver
//! 2. [`docking_system`]: charge robots sitting on a charger
//! 3. [`charging_advice_system`]: send low robots to charge, preempting work
//! 4. [`dispatch_system`]: assign pending tasks to ranked robots

mod charging;
mod dispatch;
mod events;
mod movement;

pub use charging::*;
pub use dispatch::*;
pub use events::*;
pub use movement::*;
