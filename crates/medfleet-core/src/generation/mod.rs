//! Generation - fleet spawning and random task creation

mod fleet;
mod tasks;

pub use fleet::*;
pub use tasks::*;
