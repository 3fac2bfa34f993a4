//! Charging systems - advisor polling, trips to stations, docking

use std::collections::HashSet;

use hecs::Entity;

use medfleet_logic::charging::ChargingAdvisor;
use medfleet_logic::config::{EnergyConfig, SimConfig};
use medfleet_logic::grid::Cell;
use medfleet_logic::model::{RobotId, RobotStatus};
use medfleet_logic::pathfinding::Pathfinder;
use medfleet_logic::reservation::{ReservationError, Schedule};

use super::{AbortReason, SimEvent};
use crate::components::{Battery, Drive, Duty, Errand, Position, RobotMetrics, Travel};
use crate::state::SimState;

/// Charge robots that are sitting on a charger; release them at the resume
/// threshold.
pub fn docking_system(state: &mut SimState, energy: &EnergyConfig, events: &mut Vec<SimEvent>) {
    for (robot, entity) in state.robots() {
        let travelling = state.is_travelling(entity);
        let Ok((duty, battery, metrics)) = state
            .world
            .query_one_mut::<(&mut Duty, &mut Battery, &mut RobotMetrics)>(entity)
        else {
            continue;
        };
        if !duty.is_docked(travelling) {
            continue;
        }

        battery.charge(energy.charge_rate);
        if battery.percent >= energy.resume_battery {
            duty.status = RobotStatus::Idle;
            duty.tasks_since_charge = 0;
            metrics.charge_cycles += 1;
            log::info!("robot {} charged to {:.1}%", robot, battery.percent);
            events.push(SimEvent::ChargingFinished {
                robot,
                battery: battery.percent,
            });
        }
    }
}

/// Outcome of looking for a charger.
enum StationTrip {
    /// Already standing on a station.
    OnStation(Cell),
    /// Route reserved; the robot docks on arrival.
    Travelling(Cell),
    /// A station is reachable but every departure conflicted this tick.
    Contested,
    /// No station can be reached at all.
    Unreachable,
}

/// Poll the advisor for idle robots and for busy robots running low.
///
/// A robot goes to charge when its priority reaches the critical threshold,
/// or when it is idle but already too low to be offered work. A busy robot
/// loses its task first (the task is re-queued). A robot whose station trip
/// is contested stays in `Charging` without docking and tries again next
/// tick.
pub fn charging_advice_system(
    state: &mut SimState,
    advisor: &ChargingAdvisor,
    config: &SimConfig,
    events: &mut Vec<SimEvent>,
) {
    for (robot, entity) in state.robots() {
        let (status, seeking, percent) = match (
            state.world.get::<&Duty>(entity),
            state.world.get::<&Battery>(entity),
        ) {
            (Ok(duty), Ok(battery)) => (duty.status, duty.seeking_station, battery.percent),
            _ => continue,
        };
        let polled = match status {
            RobotStatus::Idle => true,
            RobotStatus::EnRoute | RobotStatus::Delivering => {
                percent < config.energy.low_battery
            }
            RobotStatus::Charging => seeking,
            RobotStatus::Disabled => false,
        };
        if !polled {
            continue;
        }
        let Some(inputs) = state.charging_inputs(entity) else {
            continue;
        };

        let priority = advisor.priority(&inputs);
        let stranded = status == RobotStatus::Idle && percent <= config.ranking.min_battery;
        if !seeking && priority < advisor.critical_threshold() && !stranded {
            continue;
        }

        if status.is_busy() {
            log::info!(
                "robot {} preempted for charging (priority {:.2}, battery {:.1}%)",
                robot,
                priority,
                percent
            );
            state.abort_errand(
                robot,
                entity,
                AbortReason::ChargingPreempted,
                config.dispatch.max_retries,
                events,
            );
        }

        let trip = send_to_station(state, robot, entity, config);
        let station = match trip {
            StationTrip::OnStation(cell) | StationTrip::Travelling(cell) => {
                log::info!("robot {} heading to station {}", robot, cell);
                Some(cell)
            }
            StationTrip::Unreachable => {
                log::info!("robot {} charging in place", robot);
                None
            }
            StationTrip::Contested => {
                if !seeking {
                    log::debug!("robot {} waiting for a clear route to a station", robot);
                }
                if let Ok(mut duty) = state.world.get::<&mut Duty>(entity) {
                    duty.status = RobotStatus::Charging;
                    duty.seeking_station = true;
                }
                continue;
            }
        };
        if let Ok(mut duty) = state.world.get::<&mut Duty>(entity) {
            duty.status = RobotStatus::Charging;
            duty.seeking_station = false;
        }
        events.push(SimEvent::ChargingStarted {
            robot,
            priority,
            station,
        });
    }
}

/// Reserve a route to the nearest station that can be reached, nearest
/// first. Each station gets the departure delays and then one detour
/// around the cells it conflicted on.
fn send_to_station(
    state: &mut SimState,
    robot: RobotId,
    entity: Entity,
    config: &SimConfig,
) -> StationTrip {
    let (start, ticks_per_cell) = match (
        state.world.get::<&Position>(entity),
        state.world.get::<&Drive>(entity),
    ) {
        (Ok(pos), Ok(drive)) => (pos.cell, drive.ticks_per_cell),
        _ => return StationTrip::Unreachable,
    };

    let mut stations = state.stations.clone();
    stations.sort_by_key(|s| (start.manhattan(*s), *s));
    if stations.contains(&start) {
        return StationTrip::OnStation(start);
    }

    let now = state.tick;
    let finder = Pathfinder::new(&state.grid).with_node_budget(config.dispatch.node_budget);
    let mut contested = false;
    for station in stations {
        let mut avoid: HashSet<Cell> = HashSet::new();
        // Direct route, then one detour.
        for _ in 0..2 {
            let route = match finder.find_path_avoiding(start, station, &avoid) {
                Ok(route) => route,
                Err(err) => {
                    log::debug!("robot {} cannot reach station {}: {}", robot, station, err);
                    break;
                }
            };
            if avoid.is_empty() {
                contested = true;
            }
            let mut conflicts = Vec::new();
            for delay in 0..=config.dispatch.max_start_delay as u64 {
                let schedule =
                    Schedule::new(route.clone(), now + delay, ticks_per_cell).waiting_from(now);
                match state
                    .reservations
                    .commit_schedule(&state.grid, &schedule, robot)
                {
                    Ok(_) => {
                        let _ = state.world.insert_one(
                            entity,
                            Travel::new(schedule, Errand::ToStation { station }),
                        );
                        return StationTrip::Travelling(station);
                    }
                    Err(ReservationError::Conflict { cell, .. }) => conflicts.push(cell),
                    Err(err) => {
                        log::debug!("robot {} to station {}: {}", robot, station, err);
                        break;
                    }
                }
            }
            let before = avoid.len();
            avoid.extend(conflicts.into_iter().filter(|c| *c != start && *c != station));
            if avoid.len() == before {
                break;
            }
        }
    }
    if contested {
        StationTrip::Contested
    } else {
        StationTrip::Unreachable
    }
}
