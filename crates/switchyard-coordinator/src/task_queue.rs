use crate::types::{TaskId, TaskPriority};
use std::collections::{HashMap, VecDeque};

/// Four FIFO lanes of pending task ids, one per [`TaskPriority`].
///
/// A task id appears at most once across all lanes.
#[derive(Debug, Default)]
pub struct TaskQueue {
    critical: VecDeque<TaskId>,
    high: VecDeque<TaskId>,
    medium: VecDeque<TaskId>,
    low: VecDeque<TaskId>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane_mut(&mut self, priority: TaskPriority) -> &mut VecDeque<TaskId> {
        match priority {
            TaskPriority::Critical => &mut self.critical,
            TaskPriority::High => &mut self.high,
            TaskPriority::Medium => &mut self.medium,
            TaskPriority::Low => &mut self.low,
        }
    }

    /// Ids in one lane, head first.
    pub fn lane(&self, priority: TaskPriority) -> &VecDeque<TaskId> {
        match priority {
            TaskPriority::Critical => &self.critical,
            TaskPriority::High => &self.high,
            TaskPriority::Medium => &self.medium,
            TaskPriority::Low => &self.low,
        }
    }

    /// Append `id` to the tail of its lane. Returns `false` if it was already queued.
    pub fn push(&mut self, priority: TaskPriority, id: TaskId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.lane_mut(priority).push_back(id);
        true
    }

    pub fn remove(&mut self, priority: TaskPriority, id: TaskId) -> bool {
        let lane = self.lane_mut(priority);
        match lane.iter().position(|queued| *queued == id) {
            Some(pos) => {
                lane.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Copy of one lane, for iteration while the lane is being mutated.
    pub fn snapshot(&self, priority: TaskPriority) -> Vec<TaskId> {
        self.lane(priority).iter().copied().collect()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        TaskPriority::SCHEDULING_ORDER
            .iter()
            .any(|p| self.lane(*p).contains(&id))
    }

    /// Total ids across all lanes.
    pub fn len(&self) -> usize {
        self.critical.len() + self.high.len() + self.medium.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every lane keyed by priority.
    pub fn status(&self) -> HashMap<TaskPriority, Vec<TaskId>> {
        TaskPriority::SCHEDULING_ORDER
            .iter()
            .map(|p| (*p, self.snapshot(*p)))
            .collect()
    }
}
