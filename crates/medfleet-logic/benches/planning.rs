use criterion::{criterion_group, criterion_main, Criterion};
use medfleet_logic::charging::{ChargingAdvisor, ChargingInputs, StrategyKind};
use medfleet_logic::floor::{FloorPlan, HOSPITAL_FLOOR};
use medfleet_logic::grid::{Cell, GridMap};
use medfleet_logic::pathfinding::Pathfinder;
use medfleet_logic::reservation::ReservationTable;
use std::hint::black_box;

fn bench_astar(c: &mut Criterion) {
    let plan = FloorPlan::parse(&HOSPITAL_FLOOR).expect("parse hospital floor");
    let finder = Pathfinder::new(&plan.grid);
    let pickup = plan.pickups[0];

    c.bench_function("astar/hospital_all_dropoffs", |b| {
        b.iter(|| {
            for &dropoff in &plan.dropoffs {
                let route = finder.find_path(black_box(pickup), dropoff).expect("route");
                black_box(route.steps());
            }
        });
    });

    let open = GridMap::walled(64, 64);
    let finder = Pathfinder::new(&open);
    c.bench_function("astar/open_64x64_corner_to_corner", |b| {
        b.iter(|| {
            let route = finder
                .find_path(black_box(Cell::new(1, 1)), Cell::new(62, 62))
                .expect("route");
            black_box(route.steps());
        });
    });
}

fn bench_reservations(c: &mut Criterion) {
    let grid = GridMap::walled(64, 64);
    let finder = Pathfinder::new(&grid);
    let routes: Vec<_> = (1..40)
        .map(|i| {
            finder
                .find_path(Cell::new(i, 1), Cell::new(i, 62))
                .expect("route")
        })
        .collect();

    c.bench_function("reservation/commit_39_lanes", |b| {
        b.iter(|| {
            let mut table = ReservationTable::new();
            for (id, route) in routes.iter().enumerate() {
                table
                    .commit(&grid, black_box(route), 0, id as u32)
                    .expect("disjoint lanes");
            }
            black_box(table.len());
        });
    });
}

fn bench_fuzzy(c: &mut Criterion) {
    let advisor = ChargingAdvisor::new(StrategyKind::Fuzzy, 8.5);
    c.bench_function("charging/fuzzy_priority", |b| {
        b.iter(|| {
            let inputs = ChargingInputs {
                charge: black_box(27.0),
                velocity: 18.0,
                workload: 6.0,
                station_distance: 22.0,
            };
            black_box(advisor.priority(&inputs));
        });
    });
}

criterion_group!(benches, bench_astar, bench_reservations, bench_fuzzy);
criterion_main!(benches);
