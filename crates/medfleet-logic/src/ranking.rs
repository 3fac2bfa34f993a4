//! Robot ranking: which idle robot should take a task.
//!
//! Each eligible robot gets
//!
//! ```text
//! score = (velocity / max_velocity * alpha + battery / 100 * beta)
//!         / max(distance, 1) * urgency_multiplier
//! ```
//!
//! where `distance` is robot → source plus source → destination (Manhattan).
//! Robots that are not idle, are at or below the operating battery floor, or
//! cannot carry the task's weight are excluded rather than scored zero.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::grid::Cell;
use crate::model::{RobotId, RobotStatus, TaskId, Urgency};

/// The ranking-relevant view of one robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub robot: RobotId,
    pub position: Cell,
    /// Velocity rating, 0–`max_velocity`.
    pub velocity: f64,
    /// Battery percentage, 0–100.
    pub battery: f64,
    pub weight_capacity: f64,
    pub status: RobotStatus,
}

/// The ranking-relevant view of one task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskProfile {
    pub task: TaskId,
    pub source: Cell,
    pub destination: Cell,
    pub urgency: Urgency,
    pub weight: f64,
}

/// A scored robot, best first in [`RankingEngine::rank`] output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedRobot {
    pub robot: RobotId,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankingError {
    /// Nobody passed the status, battery and weight gates. The task should
    /// stay pending.
    #[error("no eligible robot for task {task}")]
    NoEligibleRobot { task: TaskId },
}

/// Weighted speed/energy/distance scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingEngine {
    /// Weight of the speed factor.
    pub alpha: f64,
    /// Weight of the energy factor.
    pub beta: f64,
    pub max_velocity: f64,
    /// Robots at or below this battery percentage are not considered.
    pub min_battery: f64,
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta: 0.4,
            max_velocity: 30.0,
            min_battery: 20.0,
        }
    }
}

impl RankingEngine {
    pub fn is_eligible(&self, candidate: &Candidate, task: &TaskProfile) -> bool {
        candidate.status == RobotStatus::Idle
            && candidate.battery > self.min_battery
            && candidate.weight_capacity >= task.weight
    }

    /// Robot → source → destination, in cells.
    pub fn trip_distance(candidate: &Candidate, task: &TaskProfile) -> u32 {
        candidate.position.manhattan(task.source) + task.source.manhattan(task.destination)
    }

    /// Score a robot regardless of eligibility.
    pub fn score(&self, candidate: &Candidate, task: &TaskProfile) -> f64 {
        let speed_factor = if self.max_velocity > 0.0 {
            candidate.velocity / self.max_velocity
        } else {
            0.0
        };
        let energy_factor = candidate.battery / 100.0;
        let distance = Self::trip_distance(candidate, task).max(1) as f64;
        (speed_factor * self.alpha + energy_factor * self.beta) / distance
            * task.urgency.score_multiplier()
    }

    /// Eligible robots ordered by score, highest first; equal scores go to
    /// the lower robot id.
    pub fn rank(
        &self,
        task: &TaskProfile,
        candidates: &[Candidate],
    ) -> Result<Vec<RankedRobot>, RankingError> {
        let mut ranked: Vec<RankedRobot> = candidates
            .iter()
            .filter(|c| self.is_eligible(c, task))
            .map(|c| RankedRobot {
                robot: c.robot,
                score: self.score(c, task),
            })
            .collect();

        if ranked.is_empty() {
            return Err(RankingError::NoEligibleRobot { task: task.task });
        }

        ranked.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.robot.cmp(&b.robot),
            other => other,
        });
        Ok(ranked)
    }

    /// The winning robot, if any.
    pub fn best(
        &self,
        task: &TaskProfile,
        candidates: &[Candidate],
    ) -> Result<RankedRobot, RankingError> {
        self.rank(task, candidates).map(|ranked| ranked[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn robot(id: RobotId, row: i32, col: i32, velocity: f64, battery: f64) -> Candidate {
        Candidate {
            robot: id,
            position: Cell::new(row, col),
            velocity,
            battery,
            weight_capacity: 10.0,
            status: RobotStatus::Idle,
        }
    }

    fn task(urgency: Urgency) -> TaskProfile {
        TaskProfile {
            task: 1,
            source: Cell::new(13, 1),
            destination: Cell::new(13, 12),
            urgency,
            weight: 3.0,
        }
    }

    #[test]
    fn test_score_formula() {
        let engine = RankingEngine::default();
        let c = robot(1, 10, 8, 25.0, 75.0);
        // distance = (3 + 7) + 11 = 21
        let expected = (25.0 / 30.0 * 0.6 + 0.75 * 0.4) / 21.0 * 2.0;
        assert!((engine.score(&c, &task(Urgency::Emergency)) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_distance_uses_one() {
        let engine = RankingEngine::default();
        let c = robot(1, 4, 4, 30.0, 100.0);
        let t = TaskProfile {
            task: 1,
            source: Cell::new(4, 4),
            destination: Cell::new(4, 4),
            urgency: Urgency::Normal,
            weight: 1.0,
        };
        assert!((engine.score(&c, &t) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_closer_robot_wins() {
        let engine = RankingEngine::default();
        let near = robot(2, 13, 2, 20.0, 80.0);
        let far = robot(1, 1, 13, 20.0, 80.0);
        let ranked = engine.rank(&task(Urgency::Normal), &[far, near]).unwrap();
        assert_eq!(ranked[0].robot, 2);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_ties_go_to_lowest_id() {
        let engine = RankingEngine::default();
        let a = robot(7, 5, 5, 20.0, 80.0);
        let b = robot(3, 5, 5, 20.0, 80.0);
        let ranked = engine.rank(&task(Urgency::Normal), &[a, b]).unwrap();
        assert_eq!(ranked[0].robot, 3);
        assert_eq!(ranked[1].robot, 7);
    }

    #[test]
    fn test_gates_exclude_rather_than_zero() {
        let engine = RankingEngine::default();
        let mut busy = robot(1, 13, 1, 30.0, 100.0);
        busy.status = RobotStatus::Delivering;
        let flat = robot(2, 13, 1, 30.0, 20.0);
        let mut weak = robot(3, 13, 1, 30.0, 100.0);
        weak.weight_capacity = 2.0;
        let ok = robot(4, 1, 13, 5.0, 25.0);

        let ranked = engine
            .rank(&task(Urgency::Normal), &[busy, flat, weak, ok])
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].robot, 4);

        assert_eq!(
            engine.rank(&task(Urgency::Normal), &[busy, flat, weak]),
            Err(RankingError::NoEligibleRobot { task: 1 })
        );
        assert!(engine.rank(&task(Urgency::Normal), &[]).is_err());
    }

    #[test]
    fn test_monotone_in_battery_and_distance() {
        let engine = RankingEngine::default();
        let t = task(Urgency::Urgent);
        let mut prev = 0.0;
        for battery in [21.0, 40.0, 60.0, 80.0, 100.0] {
            let s = engine.score(&robot(1, 5, 5, 20.0, battery), &t);
            assert!(s >= prev);
            prev = s;
        }
        let mut prev = f64::INFINITY;
        for row in (1..=13).rev() {
            let s = engine.score(&robot(1, row, 1, 20.0, 60.0), &t);
            assert!(s <= prev, "row {row}");
            prev = s;
        }
    }

    #[test]
    fn test_urgency_ordering() {
        let engine = RankingEngine::default();
        let c = robot(1, 5, 5, 18.0, 85.0);
        let normal = engine.score(&c, &task(Urgency::Normal));
        let urgent = engine.score(&c, &task(Urgency::Urgent));
        let emergency = engine.score(&c, &task(Urgency::Emergency));
        assert!(emergency >= urgent && urgent >= normal);
    }
}
