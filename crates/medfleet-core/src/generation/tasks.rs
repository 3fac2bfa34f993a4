//! Random task generation

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use medfleet_logic::floor::FloorPlan;
use medfleet_logic::grid::Cell;
use medfleet_logic::model::{TaskKind, TaskRequest, Urgency};

/// Seeded source of delivery requests between the floor's pickup and
/// drop-off points. The same seed always yields the same sequence.
pub struct TaskGenerator {
    rng: StdRng,
    pickups: Vec<Cell>,
    dropoffs: Vec<Cell>,
}

impl TaskGenerator {
    pub fn new(plan: &FloorPlan, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            pickups: plan.pickups.clone(),
            dropoffs: plan.dropoffs.clone(),
        }
    }

    /// `None` when the floor has no pickup or no drop-off point.
    pub fn next_request(&mut self) -> Option<TaskRequest> {
        if self.pickups.is_empty() || self.dropoffs.is_empty() {
            return None;
        }
        let source = self.pickups[self.rng.gen_range(0..self.pickups.len())];
        let destination = self.dropoffs[self.rng.gen_range(0..self.dropoffs.len())];
        let kind = TaskKind::ALL[self.rng.gen_range(0..TaskKind::ALL.len())];

        // Mostly routine traffic: 70% normal, 25% urgent, 5% emergency
        let roll: f64 = self.rng.gen();
        let urgency = if roll < 0.70 {
            Urgency::Normal
        } else if roll < 0.95 {
            Urgency::Urgent
        } else {
            Urgency::Emergency
        };

        let weight = (self.rng.gen_range(0.5..10.0_f64) * 10.0).round() / 10.0;
        Some(TaskRequest {
            source,
            destination,
            kind,
            urgency,
            weight,
        })
    }

    pub fn batch(&mut self, count: usize) -> Vec<TaskRequest> {
        (0..count).map_while(|_| self.next_request()).collect()
    }
}
