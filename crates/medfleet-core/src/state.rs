//! Mutable simulation state shared by the tick systems.

use std::collections::BTreeMap;

use hecs::{Entity, World};

use medfleet_logic::charging::ChargingInputs;
use medfleet_logic::grid::{Cell, GridMap};
use medfleet_logic::model::{RobotId, TaskId, TaskStatus, Tick};
use medfleet_logic::ranking::Candidate;
use medfleet_logic::reservation::ReservationTable;

use crate::components::*;
use crate::systems::{AbortReason, SimEvent};

/// Robot id → entity, iterated in id order.
pub type Roster = BTreeMap<RobotId, Entity>;

/// Everything the systems read and write.
pub struct SimState {
    /// Robot entities.
    pub world: World,
    pub roster: Roster,
    pub grid: GridMap,
    pub stations: Vec<Cell>,
    pub tasks: TaskQueue,
    pub reservations: ReservationTable,
    pub tick: Tick,
}

impl SimState {
    pub fn new(grid: GridMap, stations: Vec<Cell>) -> Self {
        Self {
            world: World::new(),
            roster: Roster::new(),
            grid,
            stations,
            tasks: TaskQueue::new(),
            reservations: ReservationTable::new(),
            tick: 0,
        }
    }

    /// Roster copy, so systems can mutate the world while iterating.
    pub fn robots(&self) -> Vec<(RobotId, Entity)> {
        self.roster.iter().map(|(&id, &e)| (id, e)).collect()
    }

    pub fn robot_entity(&self, robot: RobotId) -> Option<Entity> {
        self.roster.get(&robot).copied()
    }

    /// Ranking view of one robot.
    pub fn candidate(&self, robot: RobotId, entity: Entity) -> Option<Candidate> {
        let pos = self.world.get::<&Position>(entity).ok()?;
        let drive = self.world.get::<&Drive>(entity).ok()?;
        let battery = self.world.get::<&Battery>(entity).ok()?;
        let duty = self.world.get::<&Duty>(entity).ok()?;
        Some(Candidate {
            robot,
            position: pos.cell,
            velocity: drive.velocity,
            battery: battery.percent,
            weight_capacity: drive.weight_capacity,
            status: duty.status,
        })
    }

    /// Ranking views of the whole fleet, in id order.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.roster
            .iter()
            .filter_map(|(&id, &e)| self.candidate(id, e))
            .collect()
    }

    /// Manhattan distance to the closest station; zero with no stations.
    pub fn station_distance(&self, cell: Cell) -> u32 {
        self.stations
            .iter()
            .map(|s| cell.manhattan(*s))
            .min()
            .unwrap_or(0)
    }

    pub fn charging_inputs(&self, entity: Entity) -> Option<ChargingInputs> {
        let pos = self.world.get::<&Position>(entity).ok()?;
        let drive = self.world.get::<&Drive>(entity).ok()?;
        let battery = self.world.get::<&Battery>(entity).ok()?;
        let duty = self.world.get::<&Duty>(entity).ok()?;
        Some(ChargingInputs {
            charge: battery.percent,
            velocity: drive.velocity,
            workload: duty.tasks_since_charge as f64,
            station_distance: self.station_distance(pos.cell) as f64,
        })
    }

    pub fn is_travelling(&self, entity: Entity) -> bool {
        self.world.get::<&Travel>(entity).is_ok()
    }

    /// Drop a robot's route and reservations. Its task, if any, goes back
    /// to the queue or fails once out of retries. The robot's status is left
    /// for the caller to set.
    pub fn abort_errand(
        &mut self,
        robot: RobotId,
        entity: Entity,
        reason: AbortReason,
        max_retries: u32,
        events: &mut Vec<SimEvent>,
    ) {
        let _ = self.world.remove_one::<Travel>(entity);
        self.reservations.release(robot);

        let task = match self.world.get::<&mut Duty>(entity) {
            Ok(mut duty) => duty.task.take(),
            Err(_) => None,
        };
        if let Some(task) = task {
            if let Ok(mut metrics) = self.world.get::<&mut RobotMetrics>(entity) {
                metrics.failed_deliveries += 1;
            }
            self.requeue_or_fail(task, reason, max_retries, events);
        }
    }

    /// Count one more retry against a task; past `max_retries` it fails.
    pub fn requeue_or_fail(
        &mut self,
        task_id: TaskId,
        reason: AbortReason,
        max_retries: u32,
        events: &mut Vec<SimEvent>,
    ) {
        let Some(task) = self.tasks.get_mut(task_id) else {
            return;
        };
        task.robot = None;
        task.assigned_at = None;
        task.started_at = None;
        task.retry_count += 1;
        if task.retry_count > max_retries {
            task.status = TaskStatus::Failed;
            log::warn!(
                "task {} failed after {} retries ({reason:?})",
                task_id,
                max_retries
            );
            events.push(SimEvent::TaskFailed {
                task: task_id,
                reason,
            });
        } else {
            task.status = TaskStatus::Pending;
            log::info!(
                "task {} re-queued, retry {}/{} ({reason:?})",
                task_id,
                task.retry_count,
                max_retries
            );
            events.push(SimEvent::TaskRequeued {
                task: task_id,
                reason,
                retry_count: task.retry_count,
            });
        }
    }
}
