//! The coordinator's cross-referenced tables, mutated under one lock.
//!
//! Every method here is synchronous and returns [`Notice`]s describing what
//! changed, so the façade can publish events after the lock is released.

use crate::dependency::DependencyGraph;
use crate::registry::AgentRegistry;
use crate::task_queue::TaskQueue;
use crate::types::{Task, TaskId, TaskPriority, TaskStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A state change the façade turns into monitoring records.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Notice {
    Created {
        task_id: TaskId,
        name: String,
        priority: TaskPriority,
        dependencies: usize,
        queued: bool,
    },
    Assigned {
        task_id: TaskId,
        agent: String,
        score: f64,
    },
    Started {
        task_id: TaskId,
        agent: String,
    },
    Finished {
        task_id: TaskId,
        status: TaskStatus,
        agent: Option<String>,
        error: Option<String>,
    },
    Reset {
        task_id: TaskId,
        agent: Option<String>,
        queued: bool,
    },
}

#[derive(Default)]
pub(crate) struct CoordinatorState {
    pub tasks: HashMap<TaskId, Task>,
    /// Creation order, used wherever tasks are walked in bulk.
    pub order: Vec<TaskId>,
    pub queue: TaskQueue,
    pub graph: DependencyGraph,
    pub registry: AgentRegistry,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly built task and run the readiness check.
    pub fn insert_task(&mut self, task: Task) -> Notice {
        let id = task.id;
        let (name, priority, dependencies) =
            (task.name.clone(), task.priority, task.dependencies.len());
        self.tasks.insert(id, task);
        self.order.push(id);
        let queued = self.enqueue_if_ready(id);
        Notice::Created {
            task_id: id,
            name,
            priority,
            dependencies,
            queued,
        }
    }

    fn dependencies_met(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep| {
            self.tasks
                .get(dep)
                .is_some_and(|t| t.status == TaskStatus::Completed)
        })
    }

    /// Push a PENDING task onto its lane if every dependency is COMPLETED,
    /// otherwise park it as a waiter on each unmet dependency.
    ///
    /// Unknown dependency ids count as unmet. Returns `true` if the task is
    /// in a lane afterwards.
    pub fn enqueue_if_ready(&mut self, id: TaskId) -> bool {
        let Some(task) = self.tasks.get(&id) else {
            return false;
        };
        if task.status != TaskStatus::Pending {
            return false;
        }
        let priority = task.priority;
        let dependencies = task.dependencies.clone();

        if self.dependencies_met(task) {
            self.graph.release(id, &dependencies);
            self.queue.push(priority, id);
            return true;
        }

        for dep in dependencies {
            let met = self
                .tasks
                .get(&dep)
                .is_some_and(|t| t.status == TaskStatus::Completed);
            if !met {
                self.graph.add_waiter(dep, id);
            }
        }
        debug!(task_id = %id, "Task parked on unmet dependencies");
        false
    }

    /// Apply a status change. Returns `None` for an unknown id or a rejected
    /// transition, otherwise the notices to publish.
    pub fn apply_status(
        &mut self,
        id: TaskId,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Vec<Notice>> {
        let task = self.tasks.get_mut(&id)?;
        let previous = task.status;
        let agent = task.assigned_agent.clone();
        let mut notices = Vec::new();

        match status {
            TaskStatus::Assigned | TaskStatus::InProgress => {
                let agent = agent?;
                task.transition(status, now);
                if status == TaskStatus::InProgress && previous != TaskStatus::InProgress {
                    notices.push(Notice::Started { task_id: id, agent });
                }
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                task.assigned_agent = None;
                if status == TaskStatus::Completed {
                    task.result = result;
                    task.error = None;
                } else {
                    task.result = None;
                    task.error = error;
                }
                task.transition(status, now);
                let priority = task.priority;
                let task_error = task.error.clone();
                let dependencies = task.dependencies.clone();

                if let Some(name) = &agent {
                    self.registry.decrement_load(name);
                }
                // A task finished straight from PENDING must leave its lane
                // and stop waiting on its dependencies.
                self.queue.remove(priority, id);
                self.graph.release(id, &dependencies);
                if status == TaskStatus::Completed {
                    self.release_waiters(id);
                }
                notices.push(Notice::Finished {
                    task_id: id,
                    status,
                    agent,
                    error: task_error,
                });
            }
            TaskStatus::Pending => {
                if previous.holds_agent() {
                    task.assigned_agent = None;
                } else if previous.is_terminal() {
                    task.result = None;
                    task.error = None;
                }
                task.transition(TaskStatus::Pending, now);

                if previous == TaskStatus::Pending {
                    return Some(notices);
                }
                if let Some(name) = &agent {
                    self.registry.decrement_load(name);
                }
                let queued = self.enqueue_if_ready(id);
                notices.push(Notice::Reset {
                    task_id: id,
                    agent,
                    queued,
                });
            }
        }
        Some(notices)
    }

    /// Rescan the waiters of a task that just completed.
    fn release_waiters(&mut self, id: TaskId) {
        for waiter in self.graph.waiters_of(id) {
            let ready = self
                .tasks
                .get(&waiter)
                .is_some_and(|t| t.status == TaskStatus::Pending && self.dependencies_met(t));
            if ready && self.enqueue_if_ready(waiter) {
                info!(task_id = %waiter, unlocked_by = %id, "Dependencies satisfied, task enqueued");
            }
        }
    }

    /// Force every ASSIGNED/IN_PROGRESS task of `agent` back to PENDING.
    pub fn reset_agent_tasks(&mut self, agent: &str, now: DateTime<Utc>) -> Vec<Notice> {
        let held: Vec<TaskId> = self
            .order
            .iter()
            .filter(|id| {
                self.tasks.get(id).is_some_and(|t| {
                    t.status.holds_agent() && t.assigned_agent.as_deref() == Some(agent)
                })
            })
            .copied()
            .collect();

        let mut notices = Vec::new();
        for id in held {
            warn!(task_id = %id, agent = %agent, "Resetting task held by departing agent");
            if let Some(mut changed) = self.apply_status(id, TaskStatus::Pending, None, None, now) {
                notices.append(&mut changed);
            }
        }
        notices
    }

    /// ASSIGNED tasks with their agent, in creation order.
    pub fn assigned_tasks(&self) -> Vec<(TaskId, String)> {
        self.order
            .iter()
            .filter_map(|id| {
                let task = self.tasks.get(id)?;
                match (&task.status, &task.assigned_agent) {
                    (TaskStatus::Assigned, Some(agent)) => Some((*id, agent.clone())),
                    _ => None,
                }
            })
            .collect()
    }

    /// Tasks in creation order.
    pub fn tasks_in_order(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }
}
