//! Shared identifiers and value types for robots and tasks.

use serde::{Deserialize, Serialize};

use crate::grid::Cell;

/// Stable robot identifier (matches the `R<n>` floor marker).
pub type RobotId = u32;
/// Task identifier, assigned in enqueue order.
pub type TaskId = u64;
/// One discrete simulation time step.
pub type Tick = u64;

/// How urgently a delivery is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Urgency {
    Normal,
    Urgent,
    Emergency,
}

impl Urgency {
    /// Multiplier applied to a robot's ranking score.
    pub fn score_multiplier(self) -> f64 {
        match self {
            Urgency::Normal => 1.0,
            Urgency::Urgent => 1.5,
            Urgency::Emergency => 2.0,
        }
    }

    /// Multiplier applied to a task's dispatch priority.
    pub fn rank(self) -> u32 {
        match self {
            Urgency::Normal => 1,
            Urgency::Urgent => 2,
            Urgency::Emergency => 3,
        }
    }
}

/// What is being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Medicine,
    BloodSample,
    Supplies,
    Equipment,
    Food,
    Documents,
    LabSample,
}

impl TaskKind {
    pub const ALL: [TaskKind; 7] = [
        TaskKind::Medicine,
        TaskKind::BloodSample,
        TaskKind::Supplies,
        TaskKind::Equipment,
        TaskKind::Food,
        TaskKind::Documents,
        TaskKind::LabSample,
    ];

    /// Base dispatch priority (1 = routine, 4 = time-critical specimens).
    pub fn base_priority(self) -> u32 {
        match self {
            TaskKind::Medicine => 3,
            TaskKind::BloodSample => 4,
            TaskKind::Supplies => 2,
            TaskKind::Equipment => 2,
            TaskKind::Food => 1,
            TaskKind::Documents => 1,
            TaskKind::LabSample => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskKind::Medicine => "Medicine Delivery",
            TaskKind::BloodSample => "Blood Samples",
            TaskKind::Supplies => "Medical Supplies",
            TaskKind::Equipment => "Medical Equipment",
            TaskKind::Food => "Meal Delivery",
            TaskKind::Documents => "Document Delivery",
            TaskKind::LabSample => "Lab Samples",
        }
    }
}

/// Dispatch priority of a task: kind base priority × urgency rank.
pub fn dispatch_priority(kind: TaskKind, urgency: Urgency) -> u32 {
    kind.base_priority() * urgency.rank()
}

/// A delivery to be queued: what, from where, to where.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub source: Cell,
    pub destination: Cell,
    pub kind: TaskKind,
    pub urgency: Urgency,
    /// Item weight in kilograms.
    pub weight: f64,
}

impl TaskRequest {
    pub fn dispatch_priority(&self) -> u32 {
        dispatch_priority(self.kind, self.urgency)
    }
}

/// Robot operating status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RobotStatus {
    /// Parked and eligible for new tasks.
    Idle,
    /// Travelling to a task's pickup point.
    EnRoute,
    /// Carrying a task's item to the drop-off point.
    Delivering,
    /// Travelling to or docked at a charging station.
    Charging,
    /// Battery exhausted; permanently out of service.
    Disabled,
}

impl RobotStatus {
    pub fn is_busy(self) -> bool {
        matches!(self, RobotStatus::EnRoute | RobotStatus::Delivering)
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_ordering() {
        assert!(Urgency::Emergency.score_multiplier() > Urgency::Urgent.score_multiplier());
        assert!(Urgency::Urgent.score_multiplier() > Urgency::Normal.score_multiplier());
    }

    #[test]
    fn test_dispatch_priority() {
        assert_eq!(dispatch_priority(TaskKind::BloodSample, Urgency::Emergency), 12);
        assert_eq!(dispatch_priority(TaskKind::Food, Urgency::Normal), 1);
        assert_eq!(dispatch_priority(TaskKind::Medicine, Urgency::Urgent), 6);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(RobotStatus::Delivering.is_busy());
        assert!(!RobotStatus::Charging.is_busy());
    }
}
