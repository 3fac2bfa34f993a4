//! Robot components.

use serde::{Deserialize, Serialize};

use medfleet_logic::grid::Cell;
use medfleet_logic::model::{RobotId, RobotStatus, TaskId};
use medfleet_logic::reservation::Schedule;

/// Robot identity. Every robot entity carries one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Robot {
    pub id: RobotId,
    pub name: String,
}

/// Current grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub cell: Cell,
}

/// Fixed drive characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drive {
    /// Velocity rating used for ranking and charging advice.
    pub velocity: f64,
    pub weight_capacity: f64,
    /// Ticks spent on each cell while travelling.
    pub ticks_per_cell: u32,
}

/// Battery level, kept within 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub percent: f64,
}

impl Battery {
    pub fn new(percent: f64) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0),
        }
    }

    /// Consume up to `amount`; returns what was actually drained.
    pub fn drain(&mut self, amount: f64) -> f64 {
        let used = amount.min(self.percent).max(0.0);
        self.percent -= used;
        used
    }

    pub fn charge(&mut self, amount: f64) {
        self.percent = (self.percent + amount).min(100.0);
    }

    pub fn is_empty(&self) -> bool {
        self.percent <= 0.0
    }
}

/// What the robot is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duty {
    pub status: RobotStatus,
    pub task: Option<TaskId>,
    /// Deliveries finished since the last full charge.
    pub tasks_since_charge: u32,
    /// Charging was decided but no route to a station could be reserved
    /// yet. Such a robot neither docks nor takes work.
    pub seeking_station: bool,
}

impl Duty {
    pub fn idle() -> Self {
        Self {
            status: RobotStatus::Idle,
            task: None,
            tasks_since_charge: 0,
            seeking_station: false,
        }
    }

    /// Charging robot with no route left, i.e. sitting on its charger.
    pub fn is_docked(&self, travelling: bool) -> bool {
        self.status == RobotStatus::Charging && !travelling && !self.seeking_station
    }
}

/// Why a robot is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Errand {
    /// Robot → source → destination. The task's item is collected at
    /// `pickup_index` in the route.
    Delivery { task: TaskId, pickup_index: usize },
    /// Heading to a charging station.
    ToStation { station: Cell },
}

/// An active, reserved route. Removed on arrival or abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Travel {
    pub schedule: Schedule,
    /// Index of the cell the robot currently occupies.
    pub index: usize,
    pub errand: Errand,
}

impl Travel {
    pub fn new(schedule: Schedule, errand: Errand) -> Self {
        Self {
            schedule,
            index: 0,
            errand,
        }
    }

    pub fn next_cell(&self) -> Option<Cell> {
        self.schedule.route().cells().get(self.index + 1).copied()
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.schedule.route().cells().len()
    }

    /// Cells still ahead of the robot.
    pub fn remaining(&self) -> &[Cell] {
        &self.schedule.route().cells()[self.index + 1..]
    }
}

/// Per-robot running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotMetrics {
    /// Cells moved.
    pub distance: u64,
    pub tasks_completed: u32,
    pub battery_consumed: f64,
    /// Deliveries this robot started but had to abandon.
    pub failed_deliveries: u32,
    pub charge_cycles: u32,
}
