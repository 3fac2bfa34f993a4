//! Simulation engine - main entry point for running the simulation

use serde::{Deserialize, Serialize};

use medfleet_logic::battery::BatteryOutlook;
use medfleet_logic::charging::ChargingAdvisor;
use medfleet_logic::config::{validate_config, ConfigError, SimConfig};
use medfleet_logic::grid::{Cell, GridError};
use medfleet_logic::model::{RobotId, RobotStatus, TaskId, TaskRequest, Tick};
use medfleet_logic::reservation::Reservation;

use crate::components::*;
use crate::generation::spawn_fleet;
use crate::persistence::{load_simulation, save_simulation, SaveError};
use crate::state::SimState;
use crate::systems::*;

/// Errors raised by the engine's public operations. Failures inside a tick
/// are never errors; they surface as [`SimEvent`]s.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ConfigError>),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown robot {0}")]
    UnknownRobot(RobotId),
    #[error("unknown task {0}")]
    UnknownTask(TaskId),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One robot as seen from outside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotView {
    pub id: RobotId,
    pub name: String,
    pub position: Cell,
    pub status: RobotStatus,
    pub battery: f64,
    pub battery_outlook: BatteryOutlook,
    /// Decided to charge but still waiting for a clear route to a station.
    pub seeking_station: bool,
    pub task: Option<TaskId>,
    /// Cells still ahead on the reserved route.
    pub route: Vec<Cell>,
    pub metrics: RobotMetrics,
}

/// Read-only copy of the whole simulation at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub tick: Tick,
    pub robots: Vec<RobotView>,
    pub tasks: Vec<Task>,
    pub reservations: Vec<Reservation>,
}

/// Fleet-wide statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetStats {
    pub tick: Tick,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    /// Assigned or in progress.
    pub active: usize,
    pub total_distance: u64,
    pub total_battery_consumed: f64,
    /// Share of robot-ticks spent moving.
    pub utilization: f64,
    /// Completed tasks over all tasks.
    pub efficiency: f64,
    /// Mean ticks from enqueue to completion.
    pub average_task_time: f64,
    /// Mean ticks from enqueue to assignment, over assigned tasks.
    pub average_wait_time: f64,
    /// Mean ticks from assignment to completion.
    pub average_execution_time: f64,
}

fn mean(values: impl Iterator<Item = Tick>) -> f64 {
    let (sum, n) = values.fold((0, 0u64), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum as f64 / n as f64
    }
}

/// Main simulation engine
pub struct SimulationEngine {
    state: SimState,
    advisor: ChargingAdvisor,
    config: SimConfig,
}

impl SimulationEngine {
    /// Validate `config`, build the floor and fleet, and queue the
    /// configured tasks at tick 0.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let errors = validate_config(&config);
        if !errors.is_empty() {
            return Err(SimError::InvalidConfig(errors));
        }

        let plan = config.floor_plan()?;
        let mut state = SimState::new(plan.grid.clone(), config.stations(&plan));
        spawn_fleet(&mut state, &config, &plan);
        for request in &config.tasks {
            state.tasks.enqueue(*request, 0);
        }

        let advisor = ChargingAdvisor::new(config.energy.strategy, config.energy.critical_priority);
        log::info!(
            "simulation ready: {}x{} floor, {} robots, {} stations, {} tasks, {} charging advice",
            state.grid.rows(),
            state.grid.cols(),
            state.roster.len(),
            state.stations.len(),
            state.tasks.len(),
            advisor.strategy_name()
        );
        Ok(Self {
            state,
            advisor,
            config,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Self::new(SimConfig::from_json(json)?)
    }

    /// Advance one tick and return what happened.
    pub fn tick(&mut self) -> Vec<SimEvent> {
        let mut events = Vec::new();
        self.state.tick += 1;
        let now = self.state.tick;
        self.state.reservations.expire_before(now);

        movement_system(
            &mut self.state,
            &self.config.energy,
            self.config.dispatch.max_retries,
            &mut events,
        );
        docking_system(&mut self.state, &self.config.energy, &mut events);
        charging_advice_system(&mut self.state, &self.advisor, &self.config, &mut events);
        dispatch_system(&mut self.state, &self.config, &mut events);

        events
    }

    /// Tick until every task is settled or `max_ticks` have run. Returns the
    /// number of ticks run.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> u64 {
        let mut ran = 0;
        while ran < max_ticks && !self.state.tasks.all_settled() {
            self.tick();
            ran += 1;
        }
        ran
    }

    /// Queue a delivery. Both cells must lie on the floor.
    pub fn enqueue_task(&mut self, request: TaskRequest) -> Result<TaskId, SimError> {
        self.state.grid.check(request.source)?;
        self.state.grid.check(request.destination)?;
        let id = self.state.tasks.enqueue(request, self.state.tick);
        log::debug!(
            "task {} queued: {} from {} to {}",
            id,
            request.kind.label(),
            request.source,
            request.destination
        );
        Ok(id)
    }

    /// Block a cell from now on. Routes already reserved through it are
    /// abandoned when the robot reaches it.
    pub fn add_obstacle(&mut self, cell: Cell) -> Result<bool, SimError> {
        Ok(self.state.grid.add_obstacle(cell)?)
    }

    pub fn clear_obstacle(&mut self, cell: Cell) -> Result<bool, SimError> {
        Ok(self.state.grid.clear_obstacle(cell)?)
    }

    pub fn current_tick(&self) -> Tick {
        self.state.tick
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn robot(&self, id: RobotId) -> Result<RobotView, SimError> {
        self.state
            .robot_entity(id)
            .and_then(|entity| self.robot_view(entity))
            .ok_or(SimError::UnknownRobot(id))
    }

    pub fn task(&self, id: TaskId) -> Result<&Task, SimError> {
        self.state.tasks.get(id).ok_or(SimError::UnknownTask(id))
    }

    fn robot_view(&self, entity: hecs::Entity) -> Option<RobotView> {
        let world = &self.state.world;
        let robot = world.get::<&Robot>(entity).ok()?;
        let pos = world.get::<&Position>(entity).ok()?;
        let drive = world.get::<&Drive>(entity).ok()?;
        let battery = world.get::<&Battery>(entity).ok()?;
        let duty = world.get::<&Duty>(entity).ok()?;
        let metrics = world.get::<&RobotMetrics>(entity).ok()?;
        let route = world
            .get::<&Travel>(entity)
            .map(|t| t.remaining().to_vec())
            .unwrap_or_default();
        Some(RobotView {
            id: robot.id,
            name: robot.name.clone(),
            position: pos.cell,
            status: duty.status,
            battery: battery.percent,
            battery_outlook: BatteryOutlook::of(
                battery.percent,
                drive.ticks_per_cell,
                &self.config.energy,
            ),
            seeking_station: duty.seeking_station,
            task: duty.task,
            route,
            metrics: *metrics,
        })
    }

    /// Robots in id order, every task, and the live reservations.
    pub fn current_state(&self) -> SimSnapshot {
        SimSnapshot {
            tick: self.state.tick,
            robots: self
                .state
                .roster
                .values()
                .filter_map(|&e| self.robot_view(e))
                .collect(),
            tasks: self.state.tasks.iter().cloned().collect(),
            reservations: self.state.reservations.entries(),
        }
    }

    pub fn stats(&self) -> FleetStats {
        let counts = self.state.tasks.counts();
        let mut stats = FleetStats {
            tick: self.state.tick,
            completed: counts.completed,
            failed: counts.failed,
            pending: counts.pending,
            active: counts.assigned + counts.in_progress,
            ..Default::default()
        };

        for &entity in self.state.roster.values() {
            if let Ok(metrics) = self.state.world.get::<&RobotMetrics>(entity) {
                stats.total_distance += metrics.distance;
                stats.total_battery_consumed += metrics.battery_consumed;
            }
        }

        let robot_ticks = self.state.roster.len() as u64 * self.state.tick;
        if robot_ticks > 0 {
            stats.utilization = stats.total_distance as f64 / robot_ticks as f64;
        }
        if counts.total() > 0 {
            stats.efficiency = counts.completed as f64 / counts.total() as f64;
        }

        let tasks = &self.state.tasks;
        stats.average_task_time = mean(tasks.iter().filter_map(Task::duration));
        stats.average_wait_time = mean(tasks.iter().filter_map(Task::wait_time));
        stats.average_execution_time = mean(tasks.iter().filter_map(Task::execution_time));
        stats
    }

    /// Save simulation state to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), SaveError> {
        save_simulation(writer, &self.state, &self.config)
    }

    /// Load simulation state from a reader
    pub fn load<R: std::io::Read>(reader: R) -> Result<Self, SaveError> {
        let loaded = load_simulation(reader)?;
        let advisor = ChargingAdvisor::new(
            loaded.config.energy.strategy,
            loaded.config.energy.critical_priority,
        );
        Ok(Self {
            state: loaded.state,
            advisor,
            config: loaded.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medfleet_logic::model::{TaskKind, TaskStatus, Urgency};

    #[test]
    fn test_engine_creation() {
        let engine = SimulationEngine::new(SimConfig::default()).unwrap();
        let snapshot = engine.current_state();
        assert_eq!(snapshot.tick, 0);
        assert_eq!(snapshot.robots.len(), 4);
        assert_eq!(snapshot.tasks.len(), 6);
        assert!(snapshot.reservations.is_empty());
        assert_eq!(engine.stats(), FleetStats {
            pending: 6,
            ..Default::default()
        });
    }

    #[test]
    fn test_robot_view_battery_outlook() {
        use medfleet_logic::battery::BatteryHealth;

        let engine = SimulationEngine::new(SimConfig::default()).unwrap();
        let robot = engine.robot(1).unwrap();
        assert_eq!(robot.battery, 75.0);
        let outlook = robot.battery_outlook;
        assert_eq!(outlook.health, BatteryHealth::Good);
        assert_eq!(outlook.remaining_cells, Some(300));
        assert_eq!(outlook.ticks_to_resume, Some(3));
        assert!(!outlook.needs_charging);
        assert!(!robot.seeking_station);
        assert_eq!(engine.current_state().robots[0].battery_outlook, outlook);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SimConfig::default();
        config.robots.clear();
        config.energy.resume_battery = 10.0;
        match SimulationEngine::new(config) {
            Err(SimError::InvalidConfig(errors)) => {
                assert!(errors.contains(&ConfigError::NoRobots));
                assert_eq!(errors.len(), 2);
            }
            other => panic!("expected invalid config, got {:?}", other.err()),
        }
        assert!(matches!(
            SimulationEngine::from_json("{ not json"),
            Err(SimError::Parse(_))
        ));
    }

    #[test]
    fn test_emergency_dispatched_first() {
        let mut engine = SimulationEngine::new(SimConfig::default()).unwrap();
        let events = engine.tick();
        let first = events
            .iter()
            .find_map(|e| match e {
                SimEvent::TaskAssigned { task, .. } => Some(*task),
                _ => None,
            })
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(engine.task(1).unwrap().status, TaskStatus::Assigned);
        assert!(!engine.state().reservations.is_empty());
    }

    #[test]
    fn test_enqueue_bounds() {
        let mut engine = SimulationEngine::new(SimConfig::default()).unwrap();
        let request = TaskRequest {
            source: Cell::new(13, 1),
            destination: Cell::new(40, 2),
            kind: TaskKind::Food,
            urgency: Urgency::Normal,
            weight: 1.0,
        };
        assert!(matches!(
            engine.enqueue_task(request),
            Err(SimError::Grid(GridError::OutOfBounds { .. }))
        ));
        let ok = TaskRequest {
            destination: Cell::new(3, 7),
            ..request
        };
        assert_eq!(engine.enqueue_task(ok).unwrap(), 7);
        assert!(matches!(engine.task(99), Err(SimError::UnknownTask(99))));
        assert!(matches!(engine.robot(9), Err(SimError::UnknownRobot(9))));
    }

    #[test]
    fn test_demo_run_completes() {
        let mut engine = SimulationEngine::new(SimConfig::default()).unwrap();
        let ran = engine.run_until_idle(2_000);
        assert!(ran < 2_000);
        let stats = engine.stats();
        assert_eq!(stats.completed + stats.failed, 6);
        assert!(stats.completed >= 5);
        assert!(stats.total_distance > 0);
        assert!(stats.utilization > 0.0 && stats.utilization <= 1.0);
    }
}
