//! State-change events returned by each tick.

use serde::{Deserialize, Serialize};

use medfleet_logic::grid::Cell;
use medfleet_logic::model::{RobotId, TaskId, Tick};

use crate::components::DeferReason;

/// Why a robot gave up its errand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// Battery ran out mid-route.
    BatteryDepleted,
    /// The charging advisor pulled the robot off its task.
    ChargingPreempted,
    /// No route exists to the source or destination.
    PathNotFound,
    /// A new obstacle appeared on the reserved route.
    Blocked,
}

/// Something the renderer or logger may want to know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    RobotMoved {
        robot: RobotId,
        from: Cell,
        to: Cell,
        battery: f64,
    },
    TaskAssigned {
        task: TaskId,
        robot: RobotId,
        score: f64,
        steps: usize,
        depart_tick: Tick,
    },
    /// The robot collected the item; the task is now in progress.
    TaskStarted { task: TaskId, robot: RobotId },
    TaskCompleted { task: TaskId, robot: RobotId },
    TaskRequeued {
        task: TaskId,
        reason: AbortReason,
        retry_count: u32,
    },
    TaskFailed { task: TaskId, reason: AbortReason },
    /// The task stays pending this tick.
    TaskDeferred { task: TaskId, reason: DeferReason },
    ReservationConflict {
        task: TaskId,
        robot: RobotId,
        conflicting_robot: RobotId,
        cell: Cell,
        tick: Tick,
    },
    /// Sent to charge. `station` is `None` when charging in place.
    ChargingStarted {
        robot: RobotId,
        priority: f64,
        station: Option<Cell>,
    },
    Docked { robot: RobotId, station: Cell },
    ChargingFinished { robot: RobotId, battery: f64 },
    RobotDisabled { robot: RobotId, cell: Cell },
}

impl SimEvent {
    /// The task this event concerns, if any.
    pub fn task(&self) -> Option<TaskId> {
        match self {
            SimEvent::TaskAssigned { task, .. }
            | SimEvent::TaskStarted { task, .. }
            | SimEvent::TaskCompleted { task, .. }
            | SimEvent::TaskRequeued { task, .. }
            | SimEvent::TaskFailed { task, .. }
            | SimEvent::TaskDeferred { task, .. }
            | SimEvent::ReservationConflict { task, .. } => Some(*task),
            _ => None,
        }
    }
}
