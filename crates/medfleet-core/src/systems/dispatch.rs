//! Dispatch system - matches pending tasks to robots and reserves their routes

use std::collections::HashSet;

use hecs::Entity;

use medfleet_logic::config::SimConfig;
use medfleet_logic::grid::Cell;
use medfleet_logic::model::{RobotId, RobotStatus, TaskId, TaskStatus};
use medfleet_logic::pathfinding::{PathError, Pathfinder, Route};
use medfleet_logic::ranking::{RankedRobot, TaskProfile};
use medfleet_logic::reservation::{ReservationError, Schedule};

use super::{AbortReason, SimEvent};
use crate::components::{DeferReason, Drive, Duty, Errand, Position, Travel};
use crate::state::SimState;

/// Result of trying to plan one delivery for one robot.
enum Plan {
    Committed {
        schedule: Schedule,
        pickup_index: usize,
    },
    /// No route exists even with nothing avoided.
    Unreachable(PathError),
    /// Gave up resolving reservation conflicts for this tick.
    Deferred,
}

/// Walk pending tasks in dispatch-priority order. Each goes to the
/// best-ranked eligible robot if a conflict-free route can be reserved;
/// otherwise it stays pending for the next tick.
pub fn dispatch_system(state: &mut SimState, config: &SimConfig, events: &mut Vec<SimEvent>) {
    for task_id in state.tasks.pending_by_priority() {
        let Some(profile) = state.tasks.get(task_id).map(|t| t.profile()) else {
            continue;
        };

        let candidates = state.candidates();
        let winner = match config.ranking.best(&profile, &candidates) {
            Ok(winner) => winner,
            Err(err) => {
                log::debug!("{}", err);
                defer(state, task_id, DeferReason::NoEligibleRobot, events);
                continue;
            }
        };
        let Some(entity) = state.robot_entity(winner.robot) else {
            continue;
        };

        match plan_delivery(state, winner.robot, entity, &profile, config, events) {
            Plan::Committed {
                schedule,
                pickup_index,
            } => assign(state, task_id, winner, entity, schedule, pickup_index, events),
            Plan::Unreachable(err) => {
                log::warn!("task {}: {}", task_id, err);
                state.requeue_or_fail(
                    task_id,
                    AbortReason::PathNotFound,
                    config.dispatch.max_retries,
                    events,
                );
            }
            Plan::Deferred => defer(state, task_id, DeferReason::ConflictsUnresolved, events),
        }
    }
}

/// Plan robot → source → destination and reserve it.
///
/// On a conflict the departure is first delayed one tick at a time up to
/// `max_start_delay`; after that the contested cell is avoided and the
/// delay starts over. Cells the route cannot do without (the robot's own
/// cell, source, destination) are never avoided.
fn plan_delivery(
    state: &mut SimState,
    robot: RobotId,
    entity: Entity,
    task: &TaskProfile,
    config: &SimConfig,
    events: &mut Vec<SimEvent>,
) -> Plan {
    let (start, ticks_per_cell) = match (
        state.world.get::<&Position>(entity),
        state.world.get::<&Drive>(entity),
    ) {
        (Ok(pos), Ok(drive)) => (pos.cell, drive.ticks_per_cell),
        _ => return Plan::Deferred,
    };
    let protected = [start, task.source, task.destination];
    let limits = &config.dispatch;
    let now = state.tick;
    let finder = Pathfinder::new(&state.grid).with_node_budget(limits.node_budget);

    let mut avoid: HashSet<Cell> = HashSet::new();
    let mut delay = 0u64;
    let mut planned: Option<(Route, usize)> = None;

    for _ in 0..limits.max_conflict_attempts.max(1) {
        let (route, pickup_index) = match planned.take() {
            Some(p) => p,
            None => match two_leg_route(&finder, start, task, &avoid) {
                Ok(p) => p,
                Err(err) if avoid.is_empty() => return Plan::Unreachable(err),
                Err(err) => {
                    log::debug!("task {}: no detour for robot {}: {}", task.task, robot, err);
                    return Plan::Deferred;
                }
            },
        };

        let schedule =
            Schedule::new(route.clone(), now + delay, ticks_per_cell).waiting_from(now);
        match state
            .reservations
            .commit_schedule(&state.grid, &schedule, robot)
        {
            Ok(_) => {
                return Plan::Committed {
                    schedule,
                    pickup_index,
                }
            }
            Err(ReservationError::Conflict {
                conflicting_robot,
                cell,
                tick,
            }) => {
                log::debug!(
                    "task {}: robot {} conflicts with robot {} at {} tick {}",
                    task.task,
                    robot,
                    conflicting_robot,
                    cell,
                    tick
                );
                events.push(SimEvent::ReservationConflict {
                    task: task.task,
                    robot,
                    conflicting_robot,
                    cell,
                    tick,
                });
                if delay < limits.max_start_delay as u64 {
                    delay += 1;
                    planned = Some((route, pickup_index));
                } else if !protected.contains(&cell) && avoid.insert(cell) {
                    delay = 0;
                } else {
                    return Plan::Deferred;
                }
            }
            Err(err) => {
                log::debug!("task {}: {}", task.task, err);
                return Plan::Deferred;
            }
        }
    }
    Plan::Deferred
}

/// Robot → source joined with source → destination. Also returns the
/// route index of the source cell.
fn two_leg_route(
    finder: &Pathfinder<'_>,
    start: Cell,
    task: &TaskProfile,
    avoid: &HashSet<Cell>,
) -> Result<(Route, usize), PathError> {
    let to_source = finder.find_path_avoiding(start, task.source, avoid)?;
    let to_destination = finder.find_path_avoiding(task.source, task.destination, avoid)?;
    let pickup_index = to_source.steps();
    Ok((to_source.join(to_destination)?, pickup_index))
}

fn assign(
    state: &mut SimState,
    task_id: TaskId,
    winner: RankedRobot,
    entity: Entity,
    schedule: Schedule,
    pickup_index: usize,
    events: &mut Vec<SimEvent>,
) {
    let robot = winner.robot;
    let steps = schedule.route().steps();
    let depart_tick = schedule.depart_tick();

    let _ = state.world.insert_one(
        entity,
        Travel::new(
            schedule,
            Errand::Delivery {
                task: task_id,
                pickup_index,
            },
        ),
    );
    if let Ok(mut duty) = state.world.get::<&mut Duty>(entity) {
        duty.status = RobotStatus::EnRoute;
        duty.task = Some(task_id);
    }
    if let Some(task) = state.tasks.get_mut(task_id) {
        task.status = TaskStatus::Assigned;
        task.robot = Some(robot);
        task.assigned_at = Some(state.tick);
        task.deferred = None;
    }

    log::info!(
        "task {} assigned to robot {} (score {:.4}, {} steps, departs tick {})",
        task_id,
        robot,
        winner.score,
        steps,
        depart_tick
    );
    events.push(SimEvent::TaskAssigned {
        task: task_id,
        robot,
        score: winner.score,
        steps,
        depart_tick,
    });
}

/// Leave a task pending. The event fires only when the reason changes.
fn defer(state: &mut SimState, task_id: TaskId, reason: DeferReason, events: &mut Vec<SimEvent>) {
    let Some(task) = state.tasks.get_mut(task_id) else {
        return;
    };
    if task.deferred == Some(reason) {
        return;
    }
    task.deferred = Some(reason);
    log::debug!("task {} deferred: {:?}", task_id, reason);
    events.push(SimEvent::TaskDeferred {
        task: task_id,
        reason,
    });
}
