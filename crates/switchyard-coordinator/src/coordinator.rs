use crate::config::CoordinatorConfig;
use crate::state::{CoordinatorState, Notice};
use crate::types::{
    AgentCapability, AgentStatus, CoordinatorSummary, Task, TaskId, TaskPriority, TaskStatus,
    TaskSummary,
};
use crate::worker::Worker;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use switchyard_core::SwitchyardResult;
use switchyard_monitor::{EventSeverity, EventType, MonitoringSystem};
use tracing::{info, warn};

/// Matches tasks to registered workers and drives them through their lifecycle.
///
/// The task table, priority lanes, dependency graph and agent registry live
/// behind one coarse lock that is never held across an await. Monitoring
/// records are written after the lock is released, so event handlers may call
/// back into the coordinator.
pub struct Coordinator {
    pub(crate) config: CoordinatorConfig,
    pub(crate) state: Mutex<CoordinatorState>,
    /// Serializes `process_tasks` passes.
    pub(crate) dispatch: tokio::sync::Mutex<()>,
    pub(crate) monitoring: Arc<MonitoringSystem>,
    pub(crate) source: String,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, monitoring: Arc<MonitoringSystem>) -> SwitchyardResult<Self> {
        config.validate()?;
        let source = format!("coordinator:{}", config.name);
        info!(coordinator = %config.name, "Coordinator created");
        Ok(Self {
            config,
            state: Mutex::new(CoordinatorState::new()),
            dispatch: tokio::sync::Mutex::new(()),
            monitoring,
            source,
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn monitoring(&self) -> &Arc<MonitoringSystem> {
        &self.monitoring
    }

    // --- Tasks ---

    /// Create a PENDING task and enqueue it if its dependencies are satisfied.
    pub fn create_task(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        priority: TaskPriority,
        dependencies: Vec<TaskId>,
        data: serde_json::Value,
        metadata: HashMap<String, serde_json::Value>,
    ) -> TaskId {
        let task = Task::new(name, description, priority)
            .with_dependencies(dependencies)
            .with_data(data)
            .with_metadata(metadata);
        self.submit(task)
    }

    /// Insert a pre-built task. Its status and assignment are reset to a fresh PENDING.
    pub fn submit(&self, mut task: Task) -> TaskId {
        task.status = TaskStatus::Pending;
        task.assigned_agent = None;
        task.completed_at = None;
        task.result = None;
        task.error = None;
        let id = task.id;
        let notice = self.state.lock().insert_task(task);
        self.publish(vec![notice]);
        id
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.state.lock().tasks.get(&id).cloned()
    }

    /// Apply a status change. Returns `false` for an unknown id, or when
    /// ASSIGNED/IN_PROGRESS is requested for a task without an agent.
    pub fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> bool {
        let applied = self
            .state
            .lock()
            .apply_status(id, status, result, error, Utc::now());
        match applied {
            Some(notices) => {
                self.publish(notices);
                true
            }
            None => {
                warn!(task_id = %id, status = %status, "Status update rejected");
                false
            }
        }
    }

    /// One scheduling pass. Returns the number of tasks assigned.
    pub fn assign_tasks(&self) -> usize {
        let notices = self.state.lock().assign_pending(&self.config, Utc::now());
        let assigned = notices.len();
        self.publish(notices);
        assigned
    }

    // --- Agents ---

    /// Register a worker under its name with load 0.
    ///
    /// Re-registering a name overwrites the previous entry in place.
    pub fn register_agent(&self, worker: Arc<dyn Worker>, capabilities: Vec<AgentCapability>) {
        let name = worker.name().to_string();
        let capability_names: Vec<String> = capabilities.iter().map(|c| c.name.clone()).collect();
        let replaced = self.state.lock().registry.register(worker, capabilities);
        if replaced {
            warn!(agent = %name, "Agent re-registered, previous registration overwritten");
        } else {
            info!(agent = %name, capabilities = ?capability_names, "Agent registered");
        }
        self.monitoring.record_event(
            EventType::AgentCreated,
            self.source.as_str(),
            serde_json::json!({
                "agent": name,
                "capabilities": capability_names,
                "replaced": replaced,
            }),
            EventSeverity::Info,
            HashMap::new(),
        );
    }

    /// Reset every task held by `name` to PENDING, then drop the agent.
    /// Returns `false` if the name is unknown.
    pub fn unregister_agent(&self, name: &str) -> bool {
        let (notices, removed) = {
            let mut state = self.state.lock();
            if !state.registry.contains(name) {
                return false;
            }
            let notices = state.reset_agent_tasks(name, Utc::now());
            let removed = state.registry.unregister(name);
            (notices, removed)
        };
        let reset = notices.len();
        self.publish(notices);

        info!(agent = %name, reset_tasks = reset, "Agent unregistered");
        self.monitoring.record_event(
            EventType::AgentDestroyed,
            self.source.as_str(),
            serde_json::json!({ "agent": name, "reset_tasks": reset }),
            EventSeverity::Info,
            HashMap::new(),
        );
        removed.is_some()
    }

    /// Append a capability to a registered agent. `false` if the name is unknown.
    pub fn register_agent_capability(&self, name: &str, capability: AgentCapability) -> bool {
        let added = self.state.lock().registry.add_capability(name, capability);
        if !added {
            warn!(agent = %name, "Capability for unknown agent ignored");
        }
        added
    }

    // --- Status views ---

    pub fn get_agent_status(&self) -> HashMap<String, AgentStatus> {
        self.state
            .lock()
            .registry
            .iter()
            .map(|agent| (agent.name.clone(), agent.status()))
            .collect()
    }

    /// Per-task summaries in creation order.
    pub fn get_task_status(&self) -> Vec<TaskSummary> {
        self.state
            .lock()
            .tasks_in_order()
            .map(TaskSummary::from)
            .collect()
    }

    pub fn get_queue_status(&self) -> HashMap<TaskPriority, Vec<TaskId>> {
        self.state.lock().queue.status()
    }

    pub fn summary(&self) -> CoordinatorSummary {
        let state = self.state.lock();
        CoordinatorSummary {
            name: self.config.name.clone(),
            agents_count: state.registry.len(),
            tasks_count: state.tasks.len(),
            pending_tasks: state.queue.len(),
            agent_capabilities: state
                .registry
                .iter()
                .map(|agent| {
                    let names = agent.capabilities.iter().map(|c| c.name.clone()).collect();
                    (agent.name.clone(), names)
                })
                .collect(),
        }
    }

    // --- Monitoring ---

    /// Turn state-change notices into events and metrics. Never called with
    /// the state lock held.
    pub(crate) fn publish(&self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::Created {
                    task_id,
                    name,
                    priority,
                    dependencies,
                    queued,
                } => {
                    info!(task_id = %task_id, name = %name, priority = %priority, queued, "Task created");
                    self.monitoring.record_event(
                        EventType::TaskCreated,
                        self.source.as_str(),
                        serde_json::json!({
                            "task_id": task_id,
                            "name": name,
                            "priority": priority,
                            "dependencies": dependencies,
                            "queued": queued,
                        }),
                        EventSeverity::Info,
                        HashMap::new(),
                    );
                }
                Notice::Assigned {
                    task_id,
                    agent,
                    score,
                } => {
                    self.monitoring.log_agent_activity(
                        &agent,
                        "task_assigned",
                        serde_json::json!({ "task_id": task_id, "score": score }),
                    );
                }
                Notice::Started { task_id, agent } => {
                    self.monitoring.record_event(
                        EventType::TaskStarted,
                        self.source.as_str(),
                        serde_json::json!({ "task_id": task_id, "agent": agent }),
                        EventSeverity::Info,
                        HashMap::new(),
                    );
                }
                Notice::Finished {
                    task_id,
                    status,
                    agent,
                    error,
                } => {
                    let (event_type, severity) = match status {
                        TaskStatus::Completed => (EventType::TaskCompleted, EventSeverity::Info),
                        TaskStatus::Failed => (EventType::TaskFailed, EventSeverity::Error),
                        _ => (EventType::TaskCancelled, EventSeverity::Warning),
                    };
                    info!(task_id = %task_id, status = %status, agent = ?agent, "Task finished");
                    self.monitoring.record_event(
                        event_type,
                        self.source.as_str(),
                        serde_json::json!({
                            "task_id": task_id,
                            "agent": agent,
                            "error": error,
                        }),
                        severity,
                        HashMap::new(),
                    );
                    if let Some(agent) = agent {
                        if status != TaskStatus::Cancelled {
                            self.monitoring.record_task_completion(
                                &agent,
                                &task_id.to_string(),
                                status == TaskStatus::Completed,
                            );
                        }
                    }
                }
                Notice::Reset {
                    task_id,
                    agent,
                    queued,
                } => {
                    info!(task_id = %task_id, agent = ?agent, queued, "Task reset to pending");
                    self.monitoring.record_event(
                        EventType::Info,
                        self.source.as_str(),
                        serde_json::json!({
                            "activity": "task_reset",
                            "task_id": task_id,
                            "agent": agent,
                            "queued": queued,
                        }),
                        EventSeverity::Info,
                        HashMap::new(),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::TaskEnvelope;
    use async_trait::async_trait;
    use switchyard_monitor::{EventQuery, MetricQuery, MonitoringConfig};

    struct Echo(&'static str);

    #[async_trait]
    impl Worker for Echo {
        fn name(&self) -> &str {
            self.0
        }

        async fn process(&self, envelope: TaskEnvelope) -> SwitchyardResult<String> {
            Ok(envelope.name)
        }
    }

    fn coordinator() -> Coordinator {
        let monitoring = Arc::new(MonitoringSystem::new(&MonitoringConfig::default()).unwrap());
        Coordinator::new(CoordinatorConfig::default(), monitoring).unwrap()
    }

    fn create(coordinator: &Coordinator, name: &str, deps: Vec<TaskId>) -> TaskId {
        coordinator.create_task(
            name,
            "",
            TaskPriority::Medium,
            deps,
            serde_json::Value::Null,
            HashMap::new(),
        )
    }

    #[test]
    fn test_rejects_invalid_config() {
        let monitoring = Arc::new(MonitoringSystem::new(&MonitoringConfig::default()).unwrap());
        let config = CoordinatorConfig {
            max_load: 0,
            ..Default::default()
        };
        assert!(Coordinator::new(config, monitoring).is_err());
    }

    #[test]
    fn test_create_task_records_event() {
        let coordinator = coordinator();
        let id = create(&coordinator, "Summarize intake", vec![]);
        let task = coordinator.get_task(id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        let events = coordinator
            .monitoring()
            .get_events(&EventQuery::new().of_type(EventType::TaskCreated));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, "coordinator:main");
        assert_eq!(events[0].data["queued"], true);
    }

    #[test]
    fn test_unknown_ids_are_sentinels() {
        let coordinator = coordinator();
        let ghost = uuid::Uuid::new_v4();
        assert!(coordinator.get_task(ghost).is_none());
        assert!(!coordinator.update_task_status(ghost, TaskStatus::Completed, None, None));
        assert!(!coordinator.unregister_agent("ghost"));
        assert!(!coordinator.register_agent_capability("ghost", AgentCapability::new("x", "", 0.5)));
    }

    #[test]
    fn test_assignment_and_manual_completion() {
        let coordinator = coordinator();
        coordinator.register_agent(Arc::new(Echo("echo")), vec![]);
        let id = create(&coordinator, "a", vec![]);

        assert_eq!(coordinator.assign_tasks(), 1);
        assert_eq!(coordinator.get_agent_status()["echo"].current_load, 1);
        assert!(coordinator.update_task_status(id, TaskStatus::InProgress, None, None));

        assert!(coordinator.update_task_status(
            id,
            TaskStatus::Completed,
            Some(serde_json::json!({"ok": true})),
            None
        ));
        let task = coordinator.get_task(id).unwrap();
        assert!(task.assigned_agent.is_none());
        assert_eq!(coordinator.get_agent_status()["echo"].current_load, 0);

        let completions = coordinator
            .monitoring()
            .get_metrics(&MetricQuery::new().named("task_completed"));
        assert_eq!(completions["task_completed"].len(), 1);
    }

    #[test]
    fn test_reregistration_keeps_position_and_resets_load() {
        let coordinator = coordinator();
        coordinator.register_agent(Arc::new(Echo("a")), vec![]);
        coordinator.register_agent(Arc::new(Echo("b")), vec![]);
        create(&coordinator, "t", vec![]);
        coordinator.assign_tasks();
        coordinator.register_agent(Arc::new(Echo("a")), vec![AgentCapability::new("intake", "", 0.7)]);

        let summary = coordinator.summary();
        assert_eq!(summary.agents_count, 2);
        assert_eq!(summary.agent_capabilities["a"], vec!["intake"]);
        assert_eq!(coordinator.get_agent_status()["a"].current_load, 0);
        assert_eq!(
            coordinator
                .monitoring()
                .get_events(&EventQuery::new().of_type(EventType::AgentCreated))
                .len(),
            3
        );
    }

    #[test]
    fn test_status_views() {
        let coordinator = coordinator();
        let a = create(&coordinator, "a", vec![]);
        let b = create(&coordinator, "b", vec![a]);

        let tasks = coordinator.get_task_status();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, a);
        assert_eq!(tasks[1].dependencies_count, 1);

        let queues = coordinator.get_queue_status();
        assert_eq!(queues[&TaskPriority::Medium], vec![a]);
        assert!(!queues.values().flatten().any(|id| *id == b));
        assert_eq!(coordinator.summary().pending_tasks, 1);
    }
}
