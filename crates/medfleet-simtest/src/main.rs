//! MedFleet Headless Simulation Harness
//!
//! Loads a fleet configuration, runs the dispatch loop and validates the
//! run: planning on the configured floor, charging advice sanity, and
//! per-tick invariants (no collisions, batteries in range, one robot per
//! active task). Runs entirely in-process with no rendering.
//!
//! Usage:
//!   cargo run -p medfleet-simtest
//!   cargo run -p medfleet-simtest -- --verbose
//!   cargo run -p medfleet-simtest -- --config floor.json --ticks 800 --random-tasks 20 --seed 7
//!   cargo run -p medfleet-simtest -- --json

use std::collections::{BTreeMap, HashSet};

use medfleet_core::generation::TaskGenerator;
use medfleet_core::prelude::*;
use medfleet_logic::charging::{ChargingAdvisor, ChargingInputs, StrategyKind};
use medfleet_logic::config::validate_config;
use medfleet_logic::floor::FloorPlan;
use medfleet_logic::pathfinding::{expand_waypoints, Pathfinder};

// ── Default configuration (the demo hospital floor) ─────────────────────
const HOSPITAL_JSON: &str = include_str!("../../../data/hospital.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

struct Options {
    verbose: bool,
    json: bool,
    config_path: Option<String>,
    ticks: u64,
    seed: u64,
    random_tasks: usize,
}

fn parse_args() -> Result<Options, String> {
    let mut opts = Options {
        verbose: false,
        json: false,
        config_path: None,
        ticks: 1_000,
        seed: 42,
        random_tasks: 0,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().ok_or(format!("{} needs a value", name));
        match arg.as_str() {
            "--verbose" => opts.verbose = true,
            "--json" => opts.json = true,
            "--config" => opts.config_path = Some(value("--config")?),
            "--ticks" => {
                opts.ticks = value("--ticks")?
                    .parse()
                    .map_err(|e| format!("--ticks: {}", e))?
            }
            "--seed" => {
                opts.seed = value("--seed")?
                    .parse()
                    .map_err(|e| format!("--seed: {}", e))?
            }
            "--random-tasks" => {
                opts.random_tasks = value("--random-tasks")?
                    .parse()
                    .map_err(|e| format!("--random-tasks: {}", e))?
            }
            other => return Err(format!("unknown argument {}", other)),
        }
    }
    Ok(opts)
}

fn main() {
    let opts = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    };
    let default_filter = if opts.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    println!("=== MedFleet Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Configuration
    let config = match load_config(&opts, &mut results) {
        Some(config) => config,
        None => return finish(&results, opts.verbose),
    };

    // 2. Planning on the configured floor
    results.extend(validate_planning(&config, opts.verbose));

    // 3. Charging advice sanity
    results.extend(validate_charging_advice(&config));

    // 4. Full run with per-tick invariants
    results.extend(run_simulation(config, &opts));

    finish(&results, opts.verbose);
}

fn finish(results: &[TestResult], verbose: bool) {
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn load_config(opts: &Options, results: &mut Vec<TestResult>) -> Option<SimConfig> {
    println!("--- Configuration ---");

    let json = match &opts.config_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                results.push(TestResult {
                    name: "config_read".into(),
                    passed: false,
                    detail: format!("{}: {}", path, e),
                });
                return None;
            }
        },
        None => HOSPITAL_JSON.to_string(),
    };

    let config = match SimConfig::from_json(&json) {
        Ok(config) => config,
        Err(e) => {
            results.push(TestResult {
                name: "config_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            return None;
        }
    };

    if opts.config_path.is_none() {
        results.push(TestResult {
            name: "config_matches_default".into(),
            passed: config == SimConfig::default(),
            detail: "embedded hospital.json equals the built-in default".into(),
        });
    }

    let errors = validate_config(&config);
    results.push(TestResult {
        name: "config_valid".into(),
        passed: errors.is_empty(),
        detail: if errors.is_empty() {
            format!(
                "{} robots, {} tasks, {} floor rows",
                config.robots.len(),
                config.tasks.len(),
                config.floor.len()
            )
        } else {
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        },
    });
    if !errors.is_empty() {
        return None;
    }
    Some(config)
}

// ── 2. Planning ─────────────────────────────────────────────────────────

fn validate_planning(config: &SimConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Planning ---");
    let mut results = Vec::new();

    let plan = match config.floor_plan() {
        Ok(plan) => plan,
        Err(e) => {
            results.push(TestResult {
                name: "floor_parse".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };
    let finder = Pathfinder::new(&plan.grid).with_node_budget(config.dispatch.node_budget);

    results.push(TestResult {
        name: "floor_landmarks".into(),
        passed: !plan.pickups.is_empty() && !plan.dropoffs.is_empty(),
        detail: format!(
            "{}x{} floor, {} walkable, {} pickups, {} drop-offs, {} stations",
            plan.grid.rows(),
            plan.grid.cols(),
            plan.grid.walkable_count(),
            plan.pickups.len(),
            plan.dropoffs.len(),
            config.stations(&plan).len()
        ),
    });

    // Every robot can reach every pickup
    let mut unreachable = Vec::new();
    for robot in &config.robots {
        let Some(start) = config.robot_start(&plan, robot) else {
            continue;
        };
        for &pickup in &plan.pickups {
            if finder.find_path(start, pickup).is_err() {
                unreachable.push(format!("R{}→{}", robot.id, pickup));
            }
        }
    }
    results.push(TestResult {
        name: "robots_reach_pickups".into(),
        passed: unreachable.is_empty(),
        detail: if unreachable.is_empty() {
            "all robots can reach all pickup points".into()
        } else {
            format!("unreachable: {}", unreachable.join(", "))
        },
    });

    // Every pickup reaches every drop-off with a shortest, continuous route
    // that survives waypoint compression
    let mut bad = Vec::new();
    let mut longest = 0;
    for &pickup in &plan.pickups {
        for &dropoff in &plan.dropoffs {
            match finder.find_path(pickup, dropoff) {
                Ok(route) => {
                    longest = longest.max(route.steps());
                    let metrics = route.metrics();
                    if verbose {
                        println!(
                            "  {} → {}: {} steps, {} turns",
                            pickup, dropoff, metrics.length, metrics.turns
                        );
                    }
                    let lossless = expand_waypoints(&route.waypoints())
                        .map(|cells| cells == route.cells())
                        .unwrap_or(false);
                    if (route.steps() as u32) < pickup.manhattan(dropoff) || !lossless {
                        bad.push(format!("{}→{}", pickup, dropoff));
                    }
                }
                Err(e) => bad.push(format!("{}→{} ({})", pickup, dropoff, e)),
            }
        }
    }
    results.push(TestResult {
        name: "delivery_routes".into(),
        passed: bad.is_empty(),
        detail: if bad.is_empty() {
            format!("all delivery routes valid, longest {} steps", longest)
        } else {
            format!("bad routes: {}", bad.join(", "))
        },
    });

    results
}

// ── 3. Charging advice ──────────────────────────────────────────────────

fn validate_charging_advice(config: &SimConfig) -> Vec<TestResult> {
    println!("--- Charging Advice ---");
    let mut results = Vec::new();

    let threshold = config.energy.critical_priority;
    for kind in [StrategyKind::Fuzzy, StrategyKind::ThresholdTable] {
        let advisor = ChargingAdvisor::new(kind, threshold);
        let inputs = |charge: f64| ChargingInputs {
            charge,
            velocity: 20.0,
            workload: 3.0,
            station_distance: 10.0,
        };

        let sweep: Vec<f64> = (0..=20).map(|i| advisor.priority(&inputs(i as f64 * 5.0))).collect();
        let in_range = sweep.iter().all(|p| (0.0..=10.0).contains(p));
        let empty = advisor.priority(&inputs(0.0));
        let low = advisor.priority(&inputs(5.0));
        let full = advisor.priority(&inputs(100.0));

        results.push(TestResult {
            name: format!("advice_{}", advisor.strategy_name()),
            passed: in_range && empty == 10.0 && low > full && !advisor.must_charge(&inputs(100.0)),
            detail: format!(
                "empty={:.2} low={:.2} full={:.2}, sweep in [0,10]={}",
                empty, low, full, in_range
            ),
        });
    }

    results
}

// ── 4. Simulation run ───────────────────────────────────────────────────

#[derive(Default)]
struct Violations {
    collisions: Vec<String>,
    /// A travelling robot on the cell of a parked one. Parked robots hold no
    /// reservations, so this is allowed and only counted.
    parked_overlaps: usize,
    battery: Vec<String>,
    binding: Vec<String>,
    stale_reservations: usize,
}

fn run_simulation(config: SimConfig, opts: &Options) -> Vec<TestResult> {
    println!("--- Simulation ---");
    let mut results = Vec::new();

    let plan: Option<FloorPlan> = config.floor_plan().ok();
    let mut engine = match SimulationEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            results.push(TestResult {
                name: "engine_start".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };

    if let (Some(plan), true) = (plan, opts.random_tasks > 0) {
        let mut generator = TaskGenerator::new(&plan, opts.seed);
        for request in generator.batch(opts.random_tasks) {
            if let Err(e) = engine.enqueue_task(request) {
                log::warn!("random task rejected: {}", e);
            }
        }
    }
    let total_tasks = engine.current_state().tasks.len();

    let mut violations = Violations::default();
    let mut event_counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut ran = 0;
    while ran < opts.ticks {
        for event in engine.tick() {
            *event_counts.entry(event_name(&event)).or_default() += 1;
        }
        ran += 1;
        check_invariants(&engine, &mut violations);
        if engine.state().tasks.all_settled() {
            break;
        }
    }

    results.push(TestResult {
        name: "no_collisions".into(),
        passed: violations.collisions.is_empty(),
        detail: format!(
            "{} ({} overlaps with parked robots, which hold no reservation)",
            summarize(&violations.collisions, "no two travelling robots shared a cell"),
            violations.parked_overlaps
        ),
    });
    results.push(TestResult {
        name: "battery_in_range".into(),
        passed: violations.battery.is_empty(),
        detail: summarize(&violations.battery, "all batteries stayed within 0-100%"),
    });
    results.push(TestResult {
        name: "single_task_binding".into(),
        passed: violations.binding.is_empty(),
        detail: summarize(&violations.binding, "every active task held by exactly one robot"),
    });
    results.push(TestResult {
        name: "reservations_expire".into(),
        passed: violations.stale_reservations == 0,
        detail: format!("{} stale reservations seen", violations.stale_reservations),
    });

    let stats = engine.stats();
    results.push(TestResult {
        name: "tasks_settled".into(),
        passed: engine.state().tasks.all_settled(),
        detail: format!(
            "{}/{} completed, {} failed, {} pending, {} active after {} ticks",
            stats.completed, total_tasks, stats.failed, stats.pending, stats.active, ran
        ),
    });

    println!("  Ticks run:          {}", ran);
    println!("  Tasks completed:    {}", stats.completed);
    println!("  Tasks failed:       {}", stats.failed);
    println!("  Distance travelled: {} cells", stats.total_distance);
    println!("  Battery consumed:   {:.2}%", stats.total_battery_consumed);
    println!("  Utilization:        {:.1}%", stats.utilization * 100.0);
    println!("  Efficiency:         {:.1}%", stats.efficiency * 100.0);
    println!("  Avg task time:      {:.1} ticks", stats.average_task_time);
    println!("  Avg wait time:      {:.1} ticks", stats.average_wait_time);
    println!("  Avg execution time: {:.1} ticks", stats.average_execution_time);
    if opts.verbose {
        for (name, count) in &event_counts {
            println!("    {:<20} {}", name, count);
        }
    }
    if opts.json {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{}", json),
            Err(e) => log::warn!("cannot encode stats: {}", e),
        }
    }
    for robot in engine.current_state().robots {
        println!(
            "  {:<12} {:?} at {} battery {:.1}% ({}) tasks {} distance {}",
            robot.name,
            robot.status,
            robot.position,
            robot.battery,
            robot.battery_outlook.health.label(),
            robot.metrics.tasks_completed,
            robot.metrics.distance
        );
    }

    results
}

fn check_invariants(engine: &SimulationEngine, violations: &mut Violations) {
    let snapshot = engine.current_state();

    // Travelling robots must never meet. Idle, docked and disabled robots
    // hold no reservation, so a route may cross their cell.
    let mut occupied = HashSet::new();
    let mut parked = HashSet::new();
    for robot in &snapshot.robots {
        if robot.route.is_empty() {
            parked.insert(robot.position);
        } else if !occupied.insert(robot.position) {
            violations
                .collisions
                .push(format!("tick {} at {}", snapshot.tick, robot.position));
        }
        if !(0.0..=100.0).contains(&robot.battery) {
            violations
                .battery
                .push(format!("tick {} {} at {:.2}", snapshot.tick, robot.name, robot.battery));
        }
    }

    violations.parked_overlaps += occupied.intersection(&parked).count();

    for task in snapshot.tasks.iter().filter(|t| t.is_active()) {
        let holders = snapshot
            .robots
            .iter()
            .filter(|r| r.task == Some(task.id))
            .count();
        if holders != 1 {
            violations
                .binding
                .push(format!("tick {} task {} held by {}", snapshot.tick, task.id, holders));
        }
    }

    violations.stale_reservations += snapshot
        .reservations
        .iter()
        .filter(|r| r.tick < snapshot.tick)
        .count();
}

fn summarize(found: &[String], ok: &str) -> String {
    match found.len() {
        0 => ok.to_string(),
        n => format!("{} violations, first: {}", n, found[0]),
    }
}

fn event_name(event: &SimEvent) -> &'static str {
    match event {
        SimEvent::RobotMoved { .. } => "robot_moved",
        SimEvent::TaskAssigned { .. } => "task_assigned",
        SimEvent::TaskStarted { .. } => "task_started",
        SimEvent::TaskCompleted { .. } => "task_completed",
        SimEvent::TaskRequeued { .. } => "task_requeued",
        SimEvent::TaskFailed { .. } => "task_failed",
        SimEvent::TaskDeferred { .. } => "task_deferred",
        SimEvent::ReservationConflict { .. } => "reservation_conflict",
        SimEvent::ChargingStarted { .. } => "charging_started",
        SimEvent::Docked { .. } => "docked",
        SimEvent::ChargingFinished { .. } => "charging_finished",
        SimEvent::RobotDisabled { .. } => "robot_disabled",
    }
}
