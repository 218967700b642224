//! Matching of queued tasks to idle agents.
//!
//! Lanes are drained CRITICAL → HIGH → MEDIUM → LOW. Each queued task goes to
//! the idle agent with the highest `capability_score × load_score`; equal
//! scores resolve to the agent registered first.

use crate::config::CoordinatorConfig;
use crate::scoring::{capability_score, load_score};
use crate::state::{CoordinatorState, Notice};
use crate::types::{Task, TaskPriority, TaskStatus};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

impl CoordinatorState {
    /// Pick the best idle agent for `task`, with its combined score.
    pub(crate) fn find_best_agent(
        &self,
        task: &Task,
        config: &CoordinatorConfig,
    ) -> Option<(String, f64)> {
        let mut best: Option<(String, f64)> = None;
        for agent in self.registry.idle() {
            let capability = capability_score(
                task,
                &agent.capabilities,
                config.default_capability_score,
            );
            let load = load_score(agent.load, config.max_load, config.min_load_score);
            let combined = capability * load;
            debug!(
                task_id = %task.id,
                agent = %agent.name,
                capability,
                load,
                combined,
                "Scored candidate"
            );
            // Strictly greater, so the first registered agent keeps a tie.
            let better = match &best {
                Some((_, score)) => combined > *score,
                None => true,
            };
            if better {
                best = Some((agent.name.clone(), combined));
            }
        }
        best
    }

    /// One scheduling pass over every lane. Returns the assignment notices.
    pub(crate) fn assign_pending(
        &mut self,
        config: &CoordinatorConfig,
        now: DateTime<Utc>,
    ) -> Vec<Notice> {
        let mut notices = Vec::new();

        for priority in TaskPriority::SCHEDULING_ORDER {
            for id in self.queue.snapshot(priority) {
                let Some(task) = self.tasks.get(&id) else {
                    self.queue.remove(priority, id);
                    continue;
                };
                if task.status != TaskStatus::Pending {
                    debug!(task_id = %id, status = %task.status, "Dropping stale lane entry");
                    self.queue.remove(priority, id);
                    continue;
                }

                let Some((agent, score)) = self.find_best_agent(task, config) else {
                    // No idle agent now means none for the rest of the pass either.
                    return notices;
                };

                if let Some(task) = self.tasks.get_mut(&id) {
                    task.assigned_agent = Some(agent.clone());
                    task.transition(TaskStatus::Assigned, now);
                }
                self.registry.increment_load(&agent);
                self.queue.remove(priority, id);
                info!(task_id = %id, agent = %agent, score, priority = %priority, "Task assigned");
                notices.push(Notice::Assigned {
                    task_id: id,
                    agent,
                    score,
                });
            }
        }
        notices
    }
}
