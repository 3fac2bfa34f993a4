//! Movement system - walks robots along their reserved routes

use medfleet_logic::config::EnergyConfig;
use medfleet_logic::grid::Cell;
use medfleet_logic::model::{RobotId, RobotStatus, TaskId, TaskStatus};

use super::{AbortReason, SimEvent};
use crate::components::{Battery, Duty, Errand, Position, RobotMetrics, Travel};
use crate::state::SimState;

/// What one robot does this tick, decided before any component is touched.
enum Step {
    Wait,
    Advance(Cell),
    Blocked(Cell),
}

/// Advance every travelling robot by at most one cell.
///
/// A robot enters `route[i + 1]` at the schedule's arrival tick for that
/// index. Moving drains the battery; reaching the task source starts the
/// task, reaching the route's end completes it (or docks at a station). A
/// robot that empties its battery away from a charger is disabled.
pub fn movement_system(
    state: &mut SimState,
    energy: &EnergyConfig,
    max_retries: u32,
    events: &mut Vec<SimEvent>,
) {
    let now = state.tick;

    for (robot, entity) in state.robots() {
        let step = match state.world.get::<&Travel>(entity) {
            Ok(travel) => match travel.next_cell() {
                Some(next) if now >= travel.schedule.arrival_tick(travel.index + 1) => {
                    if state.grid.walkable(next) {
                        Step::Advance(next)
                    } else {
                        Step::Blocked(next)
                    }
                }
                _ => Step::Wait,
            },
            Err(_) => continue,
        };

        start_if_at_pickup(state, robot, entity, events);

        match step {
            Step::Wait => {}
            Step::Blocked(cell) => {
                log::warn!("robot {} blocked by new obstacle at {}", robot, cell);
                state.abort_errand(robot, entity, AbortReason::Blocked, max_retries, events);
                if let Ok(mut duty) = state.world.get::<&mut Duty>(entity) {
                    duty.status = RobotStatus::Idle;
                }
                continue;
            }
            Step::Advance(to) => {
                if let Ok((pos, battery, travel, metrics)) = state.world.query_one_mut::<(
                    &mut Position,
                    &mut Battery,
                    &mut Travel,
                    &mut RobotMetrics,
                )>(entity)
                {
                    let from = pos.cell;
                    pos.cell = to;
                    travel.index += 1;
                    let used = battery.drain(energy.drain_per_cell);
                    metrics.distance += 1;
                    metrics.battery_consumed += used;
                    events.push(SimEvent::RobotMoved {
                        robot,
                        from,
                        to,
                        battery: battery.percent,
                    });
                }
                start_if_at_pickup(state, robot, entity, events);
            }
        }

        let arrived = match state.world.get::<&Travel>(entity) {
            Ok(travel) if travel.is_last() && now >= travel.schedule.finish_tick() => {
                Some(travel.errand)
            }
            _ => None,
        };
        match arrived {
            Some(Errand::Delivery { task, .. }) => {
                complete_delivery(state, robot, entity, task, events)
            }
            Some(Errand::ToStation { station }) => {
                let _ = state.world.remove_one::<Travel>(entity);
                state.reservations.release(robot);
                log::info!("robot {} docked at {}", robot, station);
                events.push(SimEvent::Docked { robot, station });
            }
            None => {}
        }

        check_depleted(state, robot, entity, max_retries, events);
    }
}

/// EnRoute robot standing on its pickup cell: the item is collected.
fn start_if_at_pickup(
    state: &mut SimState,
    robot: RobotId,
    entity: hecs::Entity,
    events: &mut Vec<SimEvent>,
) {
    let Ok((duty, travel)) = state.world.query_one_mut::<(&mut Duty, &Travel)>(entity) else {
        return;
    };
    let Errand::Delivery { task, pickup_index } = travel.errand else {
        return;
    };
    if duty.status != RobotStatus::EnRoute || travel.index != pickup_index {
        return;
    }
    duty.status = RobotStatus::Delivering;
    if let Some(t) = state.tasks.get_mut(task) {
        t.status = TaskStatus::InProgress;
        t.started_at = Some(state.tick);
    }
    log::debug!("robot {} picked up task {}", robot, task);
    events.push(SimEvent::TaskStarted { task, robot });
}

fn complete_delivery(
    state: &mut SimState,
    robot: RobotId,
    entity: hecs::Entity,
    task: TaskId,
    events: &mut Vec<SimEvent>,
) {
    let _ = state.world.remove_one::<Travel>(entity);
    state.reservations.release(robot);

    if let Ok((duty, metrics)) = state
        .world
        .query_one_mut::<(&mut Duty, &mut RobotMetrics)>(entity)
    {
        duty.status = RobotStatus::Idle;
        duty.task = None;
        duty.tasks_since_charge += 1;
        metrics.tasks_completed += 1;
    }
    if let Some(t) = state.tasks.get_mut(task) {
        t.status = TaskStatus::Completed;
        t.completed_at = Some(state.tick);
        t.robot = None;
    }
    log::info!("robot {} completed task {} at tick {}", robot, task, state.tick);
    events.push(SimEvent::TaskCompleted { task, robot });
}

/// An empty battery anywhere but on a charger takes the robot out of
/// service for good.
fn check_depleted(
    state: &mut SimState,
    robot: RobotId,
    entity: hecs::Entity,
    max_retries: u32,
    events: &mut Vec<SimEvent>,
) {
    let travelling = state.is_travelling(entity);
    let stranded = match (
        state.world.get::<&Battery>(entity),
        state.world.get::<&Duty>(entity),
    ) {
        (Ok(battery), Ok(duty)) => {
            battery.is_empty()
                && duty.status != RobotStatus::Disabled
                && !duty.is_docked(travelling)
        }
        _ => false,
    };
    if !stranded {
        return;
    }

    state.abort_errand(robot, entity, AbortReason::BatteryDepleted, max_retries, events);
    if let Ok((duty, pos)) = state
        .world
        .query_one_mut::<(&mut Duty, &Position)>(entity)
    {
        duty.status = RobotStatus::Disabled;
        let cell = pos.cell;
        log::warn!("robot {} battery depleted at {}, disabled", robot, cell);
        events.push(SimEvent::RobotDisabled { robot, cell });
    }
}
