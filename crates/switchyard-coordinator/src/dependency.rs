use crate::types::TaskId;
use std::collections::HashMap;

/// Maps a task id to the tasks parked until it completes.
///
/// Entries are only removed when a waiter is released, so a waiter stays
/// registered under every dependency it still needs.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    waiters: HashMap<TaskId, Vec<TaskId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `waiter` on `dependency`. Idempotent.
    pub fn add_waiter(&mut self, dependency: TaskId, waiter: TaskId) {
        let list = self.waiters.entry(dependency).or_default();
        if !list.contains(&waiter) {
            list.push(waiter);
        }
    }

    /// Tasks currently parked on `dependency`, in the order they were parked.
    pub fn waiters_of(&self, dependency: TaskId) -> Vec<TaskId> {
        self.waiters.get(&dependency).cloned().unwrap_or_default()
    }

    /// Remove `waiter` from the lists of all its dependencies.
    pub fn release(&mut self, waiter: TaskId, dependencies: &[TaskId]) {
        for dep in dependencies {
            if let Some(list) = self.waiters.get_mut(dep) {
                list.retain(|id| *id != waiter);
                if list.is_empty() {
                    self.waiters.remove(dep);
                }
            }
        }
    }

    pub fn is_waiting(&self, waiter: TaskId) -> bool {
        self.waiters.values().any(|list| list.contains(&waiter))
    }

    /// Number of dependencies with at least one waiter.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
