use crate::coordinator::Coordinator;
use crate::state::Notice;
use crate::types::{ProcessReport, TaskEnvelope, TaskId, TaskOutcome, TaskStatus, WorkerState};
use crate::worker::Worker;
use chrono::Utc;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use switchyard_core::{SwitchyardError, SwitchyardResult};
use switchyard_monitor::EventSeverity;
use tracing::{debug, error, info, warn};

/// Parse worker output as JSON, wrapping anything else as `{"response": text}`.
pub fn parse_worker_output(text: &str) -> serde_json::Value {
    serde_json::from_str(text.trim())
        .unwrap_or_else(|_| serde_json::json!({ "response": text }))
}

/// Await the worker, turning a panic into a worker error.
async fn run_worker(worker: &dyn Worker, envelope: TaskEnvelope) -> SwitchyardResult<String> {
    match AssertUnwindSafe(worker.process(envelope)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            Err(SwitchyardError::Worker(format!("worker panicked: {reason}")))
        }
    }
}

enum Dispatch {
    Run(Arc<dyn Worker>, TaskEnvelope),
    Skip,
}

impl Coordinator {
    /// Dispatch every ASSIGNED task to its worker and record the outcomes.
    ///
    /// Tasks are dispatched one at a time in creation order and each worker
    /// call is awaited without a timeout. Concurrent passes are serialized.
    pub async fn process_tasks(&self) -> ProcessReport {
        let _pass = self.dispatch.lock().await;
        let assigned = self.state.lock().assigned_tasks();
        let mut report = ProcessReport::default();

        for (task_id, agent) in assigned {
            let (worker, envelope) = match self.begin_dispatch(task_id, &agent) {
                Dispatch::Run(worker, envelope) => (worker, envelope),
                Dispatch::Skip => continue,
            };
            report.processed += 1;

            debug!(task_id = %task_id, agent = %agent, "Dispatching task");
            let started = Instant::now();
            let outcome = run_worker(worker.as_ref(), envelope).await;
            let elapsed = started.elapsed().as_secs_f64();

            let (status, result, message) = match outcome {
                Ok(text) => {
                    self.monitoring.record_response_time(&agent, elapsed);
                    (TaskStatus::Completed, Some(parse_worker_output(&text)), None)
                }
                Err(e) => {
                    let message = e.to_string();
                    error!(task_id = %task_id, agent = %agent, error = %message, "Worker failed");
                    self.monitoring.record_error(
                        &format!("agent:{agent}"),
                        &message,
                        EventSeverity::Error,
                    );
                    (TaskStatus::Failed, None, Some(message))
                }
            };

            let detail = match self.finish_dispatch(task_id, &agent, status, result, message.clone()) {
                Some(notices) => {
                    self.publish(notices);
                    match status {
                        TaskStatus::Completed => report.completed += 1,
                        _ => report.failed += 1,
                    }
                    TaskOutcome {
                        task_id,
                        agent,
                        status,
                        processing_time_secs: elapsed,
                        error: message,
                    }
                }
                None => {
                    let current = self
                        .get_task(task_id)
                        .map_or(TaskStatus::Pending, |t| t.status);
                    warn!(
                        task_id = %task_id,
                        agent = %agent,
                        current = %current,
                        "Task left the agent while it was running, result discarded"
                    );
                    TaskOutcome {
                        task_id,
                        agent,
                        status: current,
                        processing_time_secs: elapsed,
                        error: Some("result discarded: task no longer held by agent".into()),
                    }
                }
            };
            report.details.push(detail);
        }

        if report.processed > 0 {
            info!(
                processed = report.processed,
                completed = report.completed,
                failed = report.failed,
                "Processing pass complete"
            );
        }
        report
    }

    /// Move an ASSIGNED task to IN_PROGRESS and hand back its worker.
    ///
    /// Unregistering an agent resets its tasks first, so a task still
    /// ASSIGNED here always has a registered worker.
    fn begin_dispatch(&self, task_id: TaskId, agent: &str) -> Dispatch {
        let mut notices = Vec::new();
        let dispatch = {
            let mut state = self.state.lock();
            let still_assigned = state.tasks.get(&task_id).is_some_and(|t| {
                t.status == TaskStatus::Assigned && t.assigned_agent.as_deref() == Some(agent)
            });
            let worker = state.registry.get(agent).map(|a| Arc::clone(&a.worker));
            match worker {
                Some(worker) if still_assigned => {
                    if let Some(mut started) =
                        state.apply_status(task_id, TaskStatus::InProgress, None, None, Utc::now())
                    {
                        notices.append(&mut started);
                    }
                    state.registry.set_activity(agent, WorkerState::Processing);
                    match state.tasks.get(&task_id) {
                        Some(task) => Dispatch::Run(worker, task.envelope()),
                        None => Dispatch::Skip,
                    }
                }
                _ => Dispatch::Skip,
            }
        };
        self.publish(notices);
        dispatch
    }

    /// Apply the worker's outcome if the task is still IN_PROGRESS for `agent`.
    fn finish_dispatch(
        &self,
        task_id: TaskId,
        agent: &str,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Option<Vec<Notice>> {
        let mut state = self.state.lock();
        let activity = if status == TaskStatus::Completed {
            WorkerState::Idle
        } else {
            WorkerState::Error
        };
        state.registry.set_activity(agent, activity);

        let held = state.tasks.get(&task_id).is_some_and(|t| {
            t.status == TaskStatus::InProgress && t.assigned_agent.as_deref() == Some(agent)
        });
        if !held {
            return None;
        }
        state.apply_status(task_id, status, result, error, Utc::now())
    }
}
