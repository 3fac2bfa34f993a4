//! Fleet spawning

use hecs::Entity;

use medfleet_logic::config::{RobotConfig, SimConfig};
use medfleet_logic::floor::FloorPlan;
use medfleet_logic::grid::Cell;

use crate::components::*;
use crate::state::SimState;

/// Spawn one robot entity and register it in the roster.
pub fn spawn_robot(state: &mut SimState, robot: &RobotConfig, cell: Cell) -> Entity {
    let entity = state.world.spawn((
        Robot {
            id: robot.id,
            name: robot.name.clone(),
        },
        Position { cell },
        Drive {
            velocity: robot.velocity,
            weight_capacity: robot.weight_capacity,
            ticks_per_cell: robot.ticks_per_cell.max(1),
        },
        Battery::new(robot.battery),
        Duty::idle(),
        RobotMetrics::default(),
    ));
    state.roster.insert(robot.id, entity);
    entity
}

/// Spawn every configured robot at its start cell. Robots without a start
/// cell are skipped; a validated config has none.
pub fn spawn_fleet(state: &mut SimState, config: &SimConfig, plan: &FloorPlan) -> Vec<Entity> {
    let mut entities = Vec::with_capacity(config.robots.len());
    for robot in &config.robots {
        match config.robot_start(plan, robot) {
            Some(cell) => {
                log::debug!("spawning {} at {}", robot.name, cell);
                entities.push(spawn_robot(state, robot, cell));
            }
            None => log::warn!("robot {} has no start cell, skipped", robot.id),
        }
    }
    entities
}
