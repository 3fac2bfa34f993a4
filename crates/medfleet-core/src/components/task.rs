//! Delivery tasks and the queue that owns them.
//!
//! Tasks are not ECS entities. They live in a [`TaskQueue`] keyed by id, and
//! robots refer to them by [`TaskId`] only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use medfleet_logic::model::{RobotId, TaskId, TaskRequest, TaskStatus, Tick};
use medfleet_logic::ranking::TaskProfile;

/// Why a task was last left pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferReason {
    NoEligibleRobot,
    ConflictsUnresolved,
}

/// One delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub request: TaskRequest,
    pub status: TaskStatus,
    pub retry_count: u32,
    /// Bound robot while Assigned or InProgress.
    pub robot: Option<RobotId>,
    pub created_at: Tick,
    /// Tick of the current assignment. Cleared when the task is re-queued.
    pub assigned_at: Option<Tick>,
    /// Tick the robot reached the source cell.
    pub started_at: Option<Tick>,
    pub completed_at: Option<Tick>,
    /// Set while pending after a failed dispatch attempt.
    pub deferred: Option<DeferReason>,
}

impl Task {
    pub fn new(id: TaskId, request: TaskRequest, created_at: Tick) -> Self {
        Self {
            id,
            request,
            status: TaskStatus::Pending,
            retry_count: 0,
            robot: None,
            created_at,
            assigned_at: None,
            started_at: None,
            completed_at: None,
            deferred: None,
        }
    }

    pub fn profile(&self) -> TaskProfile {
        TaskProfile {
            task: self.id,
            source: self.request.source,
            destination: self.request.destination,
            urgency: self.request.urgency,
            weight: self.request.weight,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TaskStatus::Assigned | TaskStatus::InProgress)
    }

    /// Ticks spent pending before the current assignment.
    pub fn wait_time(&self) -> Option<Tick> {
        self.assigned_at.map(|at| at - self.created_at)
    }

    /// Ticks from assignment to completion.
    pub fn execution_time(&self) -> Option<Tick> {
        Some(self.completed_at? - self.assigned_at?)
    }

    /// Ticks from enqueue to completion.
    pub fn duration(&self) -> Option<Tick> {
        self.completed_at.map(|at| at - self.created_at)
    }
}

/// Task counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub assigned: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.pending + self.assigned + self.in_progress + self.completed + self.failed
    }
}

/// All tasks ever enqueued, by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskQueue {
    tasks: BTreeMap<TaskId, Task>,
    next_id: TaskId,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn enqueue(&mut self, request: TaskRequest, now: Tick) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.insert(id, Task::new(id, request, now));
        id
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Pending task ids, highest dispatch priority first, then oldest id.
    pub fn pending_by_priority(&self) -> Vec<TaskId> {
        let mut pending: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect();
        pending.sort_by(|a, b| {
            b.request
                .dispatch_priority()
                .cmp(&a.request.dispatch_priority())
                .then(a.id.cmp(&b.id))
        });
        pending.into_iter().map(|t| t.id).collect()
    }

    pub fn counts(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for task in self.tasks.values() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Assigned => counts.assigned += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// True once every task is Completed or Failed.
    pub fn all_settled(&self) -> bool {
        self.tasks.values().all(|t| t.status.is_terminal())
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medfleet_logic::grid::Cell;
    use medfleet_logic::model::{TaskKind, Urgency};

    fn request(kind: TaskKind, urgency: Urgency) -> TaskRequest {
        TaskRequest {
            source: Cell::new(13, 1),
            destination: Cell::new(3, 7),
            kind,
            urgency,
            weight: 2.0,
        }
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut queue = TaskQueue::new();
        assert_eq!(queue.enqueue(request(TaskKind::Food, Urgency::Normal), 0), 1);
        assert_eq!(queue.enqueue(request(TaskKind::Food, Urgency::Normal), 0), 2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get(2).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_pending_order() {
        let mut queue = TaskQueue::new();
        let food = queue.enqueue(request(TaskKind::Food, Urgency::Normal), 0);
        let blood = queue.enqueue(request(TaskKind::BloodSample, Urgency::Emergency), 0);
        let docs = queue.enqueue(request(TaskKind::Documents, Urgency::Normal), 0);
        let meds = queue.enqueue(request(TaskKind::Medicine, Urgency::Urgent), 0);
        queue.get_mut(meds).unwrap().status = TaskStatus::Assigned;
        assert_eq!(queue.pending_by_priority(), vec![blood, food, docs]);
    }

    #[test]
    fn test_counts_and_settled() {
        let mut queue = TaskQueue::new();
        let a = queue.enqueue(request(TaskKind::Food, Urgency::Normal), 0);
        let b = queue.enqueue(request(TaskKind::Food, Urgency::Normal), 0);
        assert!(!queue.all_settled());
        queue.get_mut(a).unwrap().status = TaskStatus::Completed;
        queue.get_mut(b).unwrap().status = TaskStatus::Failed;
        let counts = queue.counts();
        assert_eq!((counts.completed, counts.failed, counts.total()), (1, 1, 2));
        assert!(queue.all_settled());
    }

    #[test]
    fn test_timings() {
        let mut task = Task::new(1, request(TaskKind::Medicine, Urgency::Urgent), 4);
        assert_eq!((task.wait_time(), task.execution_time(), task.duration()), (None, None, None));

        task.assigned_at = Some(7);
        task.started_at = Some(10);
        assert_eq!(task.wait_time(), Some(3));
        assert_eq!(task.execution_time(), None);

        task.completed_at = Some(20);
        assert_eq!(task.execution_time(), Some(13));
        assert_eq!(task.duration(), Some(16));
    }
}
