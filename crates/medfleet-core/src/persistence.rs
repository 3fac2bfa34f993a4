//! Save/Load functionality for persisting simulation state
//!
//! Uses bincode for a compact binary snapshot of the whole run: the config
//! it was started from, the grid with its dynamic obstacles, every robot's
//! components, the task queue and the reservation table. Robot entities are
//! rebuilt on load; entity handles are never persisted, only robot ids.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use medfleet_logic::config::SimConfig;
use medfleet_logic::grid::{Cell, GridMap};
use medfleet_logic::model::Tick;
use medfleet_logic::reservation::{Reservation, ReservationTable};

use crate::components::*;
use crate::state::SimState;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 2;

/// Serializable snapshot of the simulation state
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    pub config: SimConfig,
    /// Grid including obstacles added at runtime
    pub grid: GridMap,
    pub stations: Vec<Cell>,
    pub tick: Tick,
    pub robots: Vec<SavedRobot>,
    pub tasks: TaskQueue,
    pub reservations: Vec<Reservation>,
}

/// All components of one robot entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRobot {
    pub robot: Robot,
    pub position: Position,
    pub drive: Drive,
    pub battery: Battery,
    pub duty: Duty,
    pub metrics: RobotMetrics,
    pub travel: Option<Travel>,
}

/// Extract every robot in roster order
fn serialize_robots(state: &SimState) -> Vec<SavedRobot> {
    let mut robots = Vec::with_capacity(state.roster.len());
    for &entity in state.roster.values() {
        let Ok(entity_ref) = state.world.entity(entity) else {
            continue;
        };
        let (Some(robot), Some(position), Some(drive), Some(battery), Some(duty), Some(metrics)) = (
            entity_ref.get::<&Robot>(),
            entity_ref.get::<&Position>(),
            entity_ref.get::<&Drive>(),
            entity_ref.get::<&Battery>(),
            entity_ref.get::<&Duty>(),
            entity_ref.get::<&RobotMetrics>(),
        ) else {
            continue;
        };
        robots.push(SavedRobot {
            robot: (*robot).clone(),
            position: *position,
            drive: *drive,
            battery: *battery,
            duty: *duty,
            metrics: *metrics,
            travel: entity_ref.get::<&Travel>().map(|t| (*t).clone()),
        });
    }
    robots
}

/// A travel cursor must point into its route.
fn check_robots(robots: &[SavedRobot]) -> Result<(), SaveError> {
    for saved in robots {
        if let Some(travel) = &saved.travel {
            let cells = travel.schedule.route().cells().len();
            if travel.index >= cells {
                return Err(SaveError::Corrupt(format!(
                    "robot {} is at route index {} of {}",
                    saved.robot.id, travel.index, cells
                )));
            }
        }
    }
    Ok(())
}

/// Spawn saved robots into a fresh state
fn deserialize_robots(state: &mut SimState, robots: Vec<SavedRobot>) {
    for saved in robots {
        let id = saved.robot.id;
        let entity = state.world.spawn((
            saved.robot,
            saved.position,
            saved.drive,
            saved.battery,
            saved.duty,
            saved.metrics,
        ));
        if let Some(travel) = saved.travel {
            let _ = state.world.insert_one(entity, travel);
        }
        state.roster.insert(id, entity);
    }
}

/// Save the complete simulation to a writer
pub fn save_simulation<W: Write>(
    writer: W,
    state: &SimState,
    config: &SimConfig,
) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        config: config.clone(),
        grid: state.grid.clone(),
        stations: state.stations.clone(),
        tick: state.tick,
        robots: serialize_robots(state),
        tasks: state.tasks.clone(),
        reservations: state.reservations.entries(),
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a simulation from a reader
pub fn load_simulation<R: Read>(reader: R) -> Result<LoadedSimulation, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    check_robots(&save_data.robots)?;

    let mut state = SimState::new(save_data.grid, save_data.stations);
    state.tick = save_data.tick;
    state.tasks = save_data.tasks;
    state.reservations = ReservationTable::from_entries(save_data.reservations);
    deserialize_robots(&mut state, save_data.robots);

    Ok(LoadedSimulation {
        config: save_data.config,
        state,
    })
}

/// Result of loading a simulation
pub struct LoadedSimulation {
    pub config: SimConfig,
    pub state: SimState,
}

/// Errors that can occur during save/load
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Corrupt save: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulationEngine;

    #[test]
    fn test_save_load_roundtrip() {
        let mut engine = SimulationEngine::new(SimConfig::default()).unwrap();
        for _ in 0..10 {
            engine.tick();
        }

        let mut save_buffer = Vec::new();
        engine.save(&mut save_buffer).expect("Save failed");

        let loaded = SimulationEngine::load(&save_buffer[..]).expect("Load failed");
        assert_eq!(loaded.current_state(), engine.current_state());
        assert_eq!(loaded.stats(), engine.stats());
    }

    #[test]
    fn test_corrupt_travel_rejected() {
        let mut engine = SimulationEngine::new(SimConfig::default()).unwrap();
        engine.tick();
        let mut save_data = SaveData {
            version: SAVE_VERSION,
            config: engine.config().clone(),
            grid: engine.state().grid.clone(),
            stations: engine.state().stations.clone(),
            tick: engine.current_tick(),
            robots: serialize_robots(engine.state()),
            tasks: engine.state().tasks.clone(),
            reservations: engine.state().reservations.entries(),
        };
        let travelling = save_data
            .robots
            .iter_mut()
            .find_map(|r| r.travel.as_mut())
            .expect("a robot was dispatched on tick 1");
        travelling.index = 10_000;

        let bytes = bincode::serialize(&save_data).unwrap();
        assert!(matches!(
            load_simulation(&bytes[..]),
            Err(SaveError::Corrupt(_))
        ));
    }

    #[test]
    fn test_empty_route_rejected() {
        let route = bincode::serialize(&Vec::<Cell>::new()).unwrap();
        assert!(bincode::deserialize::<medfleet_logic::pathfinding::Route>(&route).is_err());
    }

    #[test]
    fn test_version_mismatch() {
        let engine = SimulationEngine::new(SimConfig::default()).unwrap();
        let mut buffer = Vec::new();
        engine.save(&mut buffer).unwrap();
        // version is the first field, a little-endian u32
        buffer[0] = 99;
        match load_simulation(&buffer[..]) {
            Err(SaveError::VersionMismatch { expected, found }) => {
                assert_eq!((expected, found), (SAVE_VERSION, 99));
            }
            other => panic!("expected version mismatch, got {:?}", other.err()),
        }
    }
}
