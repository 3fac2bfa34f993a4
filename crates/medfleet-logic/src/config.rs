//! Simulation configuration and validation.
//!
//! Everything the engine needs at startup lives in one [`SimConfig`]: the
//! floor plan as symbol rows, the fleet, ranking weights, energy thresholds,
//! dispatch limits and the initial task list. The default reproduces the
//! demo hospital floor with four robots and six deliveries.
//!
//! ```
//! use medfleet_logic::config::{validate_config, SimConfig};
//!
//! let config = SimConfig::default();
//! assert!(validate_config(&config).is_empty());
//! assert_eq!(config.robots.len(), 4);
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::charging::StrategyKind;
use crate::floor::{FloorPlan, HOSPITAL_FLOOR};
use crate::grid::{Cell, GridError};
use crate::model::{RobotId, TaskKind, TaskRequest, Urgency};
use crate::pathfinding::DEFAULT_NODE_BUDGET;
use crate::ranking::RankingEngine;

/// One robot's starting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    pub id: RobotId,
    pub name: String,
    /// Explicit start cell. `None` uses the `R<id>` floor marker.
    #[serde(default)]
    pub start: Option<Cell>,
    /// Velocity rating (0–`max_velocity`), used for ranking and charging.
    pub velocity: f64,
    /// Initial battery percentage.
    pub battery: f64,
    /// Heaviest item the robot can carry (kg).
    pub weight_capacity: f64,
    /// Ticks spent on each cell of a route.
    #[serde(default = "default_ticks_per_cell")]
    pub ticks_per_cell: u32,
}

fn default_ticks_per_cell() -> u32 {
    1
}

impl RobotConfig {
    pub fn new(id: RobotId, name: &str, velocity: f64, battery: f64, weight_capacity: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            start: None,
            velocity,
            battery,
            weight_capacity,
            ticks_per_cell: 1,
        }
    }

    pub fn at(mut self, start: Cell) -> Self {
        self.start = Some(start);
        self
    }
}

/// Battery and charging behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub strategy: StrategyKind,
    /// Advisor priority at or above which a robot is sent to charge.
    pub critical_priority: f64,
    /// Busy robots below this battery percentage are polled by the advisor.
    pub low_battery: f64,
    /// Charging robots return to service at this percentage.
    pub resume_battery: f64,
    /// Battery percentage consumed per cell moved.
    pub drain_per_cell: f64,
    /// Battery percentage gained per tick while docked.
    pub charge_rate: f64,
    /// Charging stations in addition to the floor's `C` markers.
    pub extra_stations: Vec<Cell>,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Fuzzy,
            critical_priority: 8.5,
            low_battery: 30.0,
            resume_battery: 80.0,
            drain_per_cell: 0.25,
            charge_rate: 2.0,
            extra_stations: Vec::new(),
        }
    }
}

/// Retry and search limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Aborted deliveries are re-queued this many times before failing.
    pub max_retries: u32,
    /// Reservation conflicts tolerated per task per dispatch pass.
    pub max_conflict_attempts: u32,
    /// Longest departure delay tried before replanning around a conflict.
    pub max_start_delay: u32,
    /// A* expansion limit.
    pub node_budget: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_conflict_attempts: 4,
            max_start_delay: 2,
            node_budget: DEFAULT_NODE_BUDGET,
        }
    }
}

/// Complete startup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Floor plan rows (see [`crate::floor`] for the legend).
    pub floor: Vec<String>,
    pub robots: Vec<RobotConfig>,
    #[serde(default)]
    pub ranking: RankingEngine,
    #[serde(default)]
    pub energy: EnergyConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Deliveries queued at startup.
    #[serde(default)]
    pub tasks: Vec<TaskRequest>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let pickup = Cell::new(13, 1);
        let task = |row, col, kind, urgency, weight| TaskRequest {
            source: pickup,
            destination: Cell::new(row, col),
            kind,
            urgency,
            weight,
        };
        Self {
            floor: HOSPITAL_FLOOR.iter().map(|r| r.to_string()).collect(),
            robots: vec![
                RobotConfig::new(1, "CargoBot-1", 25.0, 75.0, 8.0),
                RobotConfig::new(2, "CargoBot-2", 18.0, 85.0, 15.0),
                RobotConfig::new(3, "CargoBot-3", 22.0, 90.0, 10.0),
                RobotConfig::new(4, "CargoBot-4", 28.0, 80.0, 6.0),
            ],
            ranking: RankingEngine::default(),
            energy: EnergyConfig::default(),
            dispatch: DispatchConfig::default(),
            tasks: vec![
                task(13, 12, TaskKind::BloodSample, Urgency::Emergency, 3.0),
                task(7, 7, TaskKind::Supplies, Urgency::Normal, 8.0),
                task(3, 12, TaskKind::Medicine, Urgency::Urgent, 2.0),
                task(8, 12, TaskKind::Equipment, Urgency::Normal, 5.0),
                task(3, 7, TaskKind::Documents, Urgency::Urgent, 1.0),
                task(11, 7, TaskKind::Food, Urgency::Normal, 4.0),
            ],
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn floor_plan(&self) -> Result<FloorPlan, GridError> {
        FloorPlan::parse(&self.floor)
    }

    /// Start cell of a robot: explicit, else its floor marker.
    pub fn robot_start(&self, plan: &FloorPlan, robot: &RobotConfig) -> Option<Cell> {
        robot
            .start
            .or_else(|| plan.robot_starts.get(&robot.id).copied())
    }

    /// Floor stations followed by configured extras, without duplicates.
    pub fn stations(&self, plan: &FloorPlan) -> Vec<Cell> {
        let mut out = plan.stations.clone();
        for &cell in &self.energy.extra_stations {
            if !out.contains(&cell) {
                out.push(cell);
            }
        }
        out
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("floor plan: {0}")]
    Floor(#[from] GridError),
    #[error("ranking weights must be non-negative and not both zero (alpha {alpha}, beta {beta})")]
    InvalidWeights { alpha: f64, beta: f64 },
    #[error("max velocity must be positive, got {0}")]
    InvalidMaxVelocity(f64),
    #[error("{name} threshold {value} is outside 0-100")]
    ThresholdOutOfRange { name: &'static str, value: f64 },
    #[error("resume threshold {resume} must be above the low-battery threshold {low}")]
    ContradictoryThresholds { low: f64, resume: f64 },
    #[error("critical priority {0} is outside (0, 10]")]
    InvalidCriticalPriority(f64),
    #[error("{name} must be positive, got {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("node budget must be at least 1")]
    ZeroNodeBudget,
    #[error("no robots configured")]
    NoRobots,
    #[error("robot {0} is configured more than once")]
    DuplicateRobot(RobotId),
    #[error("robot {0} has no start cell and no R{0} floor marker")]
    MissingStart(RobotId),
    #[error("robots {first} and {second} both start on {cell}")]
    SharedStart {
        first: RobotId,
        second: RobotId,
        cell: Cell,
    },
    #[error("robot {robot} starts on non-walkable cell {cell}")]
    StartNotWalkable { robot: RobotId, cell: Cell },
    #[error("robot {0} has a zero speed factor")]
    ZeroSpeedFactor(RobotId),
    #[error("robot {robot} battery {battery} is outside 0-100")]
    BatteryOutOfRange { robot: RobotId, battery: f64 },
    #[error("robot {robot} velocity {velocity} is outside 0-{max}")]
    VelocityOutOfRange { robot: RobotId, velocity: f64, max: f64 },
    #[error("charging station {0} is not walkable")]
    StationNotWalkable(Cell),
    #[error("task #{index} uses non-walkable cell {cell}")]
    TaskCellNotWalkable { index: usize, cell: Cell },
    #[error("task #{index} has non-positive weight {weight}")]
    InvalidTaskWeight { index: usize, weight: f64 },
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &SimConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    let r = &config.ranking;
    if r.alpha < 0.0 || r.beta < 0.0 || r.alpha + r.beta <= 0.0 {
        errors.push(ConfigError::InvalidWeights {
            alpha: r.alpha,
            beta: r.beta,
        });
    }
    if r.max_velocity <= 0.0 {
        errors.push(ConfigError::InvalidMaxVelocity(r.max_velocity));
    }

    let e = &config.energy;
    for (name, value) in [
        ("minimum operating", r.min_battery),
        ("low battery", e.low_battery),
        ("resume", e.resume_battery),
    ] {
        if !(0.0..=100.0).contains(&value) {
            errors.push(ConfigError::ThresholdOutOfRange { name, value });
        }
    }
    if e.resume_battery <= e.low_battery {
        errors.push(ConfigError::ContradictoryThresholds {
            low: e.low_battery,
            resume: e.resume_battery,
        });
    }
    if e.critical_priority <= 0.0 || e.critical_priority > 10.0 {
        errors.push(ConfigError::InvalidCriticalPriority(e.critical_priority));
    }
    if e.drain_per_cell <= 0.0 {
        errors.push(ConfigError::InvalidRate {
            name: "drain per cell",
            value: e.drain_per_cell,
        });
    }
    if e.charge_rate <= 0.0 {
        errors.push(ConfigError::InvalidRate {
            name: "charge rate",
            value: e.charge_rate,
        });
    }
    if config.dispatch.node_budget == 0 {
        errors.push(ConfigError::ZeroNodeBudget);
    }

    let plan = match config.floor_plan() {
        Ok(plan) => Some(plan),
        Err(err) => {
            errors.push(err.into());
            None
        }
    };

    if config.robots.is_empty() {
        errors.push(ConfigError::NoRobots);
    }
    let mut seen = HashSet::new();
    let mut starts: HashMap<Cell, RobotId> = HashMap::new();
    for robot in &config.robots {
        if !seen.insert(robot.id) {
            errors.push(ConfigError::DuplicateRobot(robot.id));
        }
        if robot.ticks_per_cell == 0 {
            errors.push(ConfigError::ZeroSpeedFactor(robot.id));
        }
        if !(0.0..=100.0).contains(&robot.battery) {
            errors.push(ConfigError::BatteryOutOfRange {
                robot: robot.id,
                battery: robot.battery,
            });
        }
        if robot.velocity < 0.0 || robot.velocity > r.max_velocity {
            errors.push(ConfigError::VelocityOutOfRange {
                robot: robot.id,
                velocity: robot.velocity,
                max: r.max_velocity,
            });
        }
        if let Some(plan) = &plan {
            match config.robot_start(plan, robot) {
                None => errors.push(ConfigError::MissingStart(robot.id)),
                Some(cell) if !plan.grid.walkable(cell) => {
                    errors.push(ConfigError::StartNotWalkable {
                        robot: robot.id,
                        cell,
                    })
                }
                Some(cell) => {
                    if let Some(&first) = starts.get(&cell) {
                        errors.push(ConfigError::SharedStart {
                            first,
                            second: robot.id,
                            cell,
                        });
                    } else {
                        starts.insert(cell, robot.id);
                    }
                }
            }
        }
    }

    if let Some(plan) = &plan {
        for &cell in &e.extra_stations {
            if !plan.grid.walkable(cell) {
                errors.push(ConfigError::StationNotWalkable(cell));
            }
        }
        for (index, task) in config.tasks.iter().enumerate() {
            for cell in [task.source, task.destination] {
                if !plan.grid.walkable(cell) {
                    errors.push(ConfigError::TaskCellNotWalkable { index, cell });
                }
            }
        }
    }
    for (index, task) in config.tasks.iter().enumerate() {
        if task.weight <= 0.0 {
            errors.push(ConfigError::InvalidTaskWeight {
                index,
                weight: task.weight,
            });
        }
    }

    errors
}
