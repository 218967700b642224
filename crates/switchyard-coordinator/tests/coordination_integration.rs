//! End-to-end coordination scenarios: scheduling, dependency unlocks,
//! unregistration while tasks are held, and dispatch through mock workers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchyard_coordinator::*;
use switchyard_core::{SwitchyardError, SwitchyardResult};
use switchyard_monitor::{
    Event, EventQuery, EventType, MetricQuery, MonitoringConfig, MonitoringSystem,
};
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Mock workers
// ---------------------------------------------------------------------------

/// Answers every task with a fixed text and counts its calls.
struct ScriptedWorker {
    name: String,
    reply: String,
    calls: AtomicUsize,
}

impl ScriptedWorker {
    fn new(name: &str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _envelope: TaskEnvelope) -> SwitchyardResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

struct FailingWorker;

#[async_trait]
impl Worker for FailingWorker {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn process(&self, envelope: TaskEnvelope) -> SwitchyardResult<String> {
        Err(SwitchyardError::Worker(format!("cannot handle {}", envelope.name)))
    }
}

struct PanickingWorker;

#[async_trait]
impl Worker for PanickingWorker {
    fn name(&self) -> &str {
        "panicky"
    }

    async fn process(&self, envelope: TaskEnvelope) -> SwitchyardResult<String> {
        panic!("exploded on {}", envelope.name);
    }
}

/// Signals when a call starts, then blocks until released.
struct GatedWorker {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl Worker for GatedWorker {
    fn name(&self) -> &str {
        "gated"
    }

    async fn process(&self, _envelope: TaskEnvelope) -> SwitchyardResult<String> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(r#"{"late": true}"#.into())
    }
}

fn coordinator() -> Arc<Coordinator> {
    let monitoring = Arc::new(MonitoringSystem::new(&MonitoringConfig::default()).unwrap());
    Arc::new(Coordinator::new(CoordinatorConfig::default(), monitoring).unwrap())
}

fn create(coordinator: &Coordinator, name: &str, priority: TaskPriority, deps: Vec<TaskId>) -> TaskId {
    coordinator.create_task(name, "", priority, deps, serde_json::Value::Null, HashMap::new())
}

fn in_any_lane(coordinator: &Coordinator, id: TaskId) -> usize {
    coordinator
        .get_queue_status()
        .values()
        .flatten()
        .filter(|queued| **queued == id)
        .count()
}

fn assert_invariants(coordinator: &Coordinator) {
    for summary in coordinator.get_task_status() {
        assert_eq!(
            summary.assigned_agent.is_some(),
            matches!(summary.status, TaskStatus::Assigned | TaskStatus::InProgress),
            "agent invariant broken for {}",
            summary.name
        );
        assert_eq!(
            summary.completed_at.is_some(),
            summary.status == TaskStatus::Completed,
            "completed_at invariant broken for {}",
            summary.name
        );
        assert!(summary.updated_at >= summary.created_at);
    }
}

// ---------------------------------------------------------------------------
// 1. Capability-aware selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn billing_task_goes_to_billing_agent() {
    let coordinator = coordinator();
    let generalist = ScriptedWorker::new("generalist", "ok");
    let billing = ScriptedWorker::new("billing", r#"{"claim": "submitted"}"#);
    coordinator.register_agent(generalist.clone(), vec![]);
    coordinator.register_agent(
        billing.clone(),
        vec![AgentCapability::new("billing", "Invoices, claims and payments", 0.9)],
    );

    let id = create(&coordinator, "Process billing claim", TaskPriority::High, vec![]);
    assert_eq!(coordinator.assign_tasks(), 1);
    assert_eq!(coordinator.get_task(id).unwrap().assigned_agent.as_deref(), Some("billing"));

    let report = coordinator.process_tasks().await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(billing.calls.load(Ordering::SeqCst), 1);
    assert_eq!(generalist.calls.load(Ordering::SeqCst), 0);

    let task = coordinator.get_task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result.unwrap()["claim"], "submitted");
    assert_invariants(&coordinator);
}

#[tokio::test]
async fn no_idle_agents_leaves_tasks_queued() {
    let coordinator = coordinator();
    let id = create(&coordinator, "orphan", TaskPriority::Low, vec![]);
    assert_eq!(coordinator.assign_tasks(), 0);
    assert_eq!(in_any_lane(&coordinator, id), 1);
    assert_eq!(coordinator.process_tasks().await.processed, 0);
}

// ---------------------------------------------------------------------------
// 2. Dependency unlocks
// ---------------------------------------------------------------------------

#[test]
fn dependent_task_enqueued_exactly_once() {
    let coordinator = coordinator();
    let a = create(&coordinator, "A", TaskPriority::Medium, vec![]);
    let b = create(&coordinator, "B", TaskPriority::Medium, vec![a]);
    let unrelated = create(&coordinator, "C", TaskPriority::Low, vec![]);
    assert_eq!(in_any_lane(&coordinator, b), 0);

    assert!(coordinator.update_task_status(a, TaskStatus::Completed, None, None));
    assert_eq!(in_any_lane(&coordinator, b), 1);

    assert!(coordinator.update_task_status(unrelated, TaskStatus::Completed, None, None));
    assert!(coordinator.update_task_status(a, TaskStatus::Completed, None, None));
    assert_eq!(in_any_lane(&coordinator, b), 1);
    assert_invariants(&coordinator);
}

#[test]
fn task_waits_for_every_dependency() {
    let coordinator = coordinator();
    let deps: Vec<TaskId> = (0..3)
        .map(|i| create(&coordinator, &format!("dep-{i}"), TaskPriority::High, vec![]))
        .collect();
    let report = create(&coordinator, "report", TaskPriority::Critical, deps.clone());

    for (i, dep) in deps.iter().enumerate() {
        assert_eq!(in_any_lane(&coordinator, report), 0, "queued after {i} completions");
        coordinator.update_task_status(*dep, TaskStatus::Completed, None, None);
    }
    assert_eq!(coordinator.get_queue_status()[&TaskPriority::Critical], vec![report]);
}

#[test]
fn failed_dependency_keeps_waiter_parked() {
    let coordinator = coordinator();
    let a = create(&coordinator, "A", TaskPriority::Medium, vec![]);
    let b = create(&coordinator, "B", TaskPriority::Medium, vec![a]);
    coordinator.update_task_status(a, TaskStatus::Failed, None, Some("boom".into()));
    assert_eq!(in_any_lane(&coordinator, b), 0);

    // Retrying the dependency by hand eventually unlocks the waiter.
    coordinator.update_task_status(a, TaskStatus::Pending, None, None);
    coordinator.update_task_status(a, TaskStatus::Completed, None, None);
    assert_eq!(in_any_lane(&coordinator, b), 1);
}

#[tokio::test]
async fn dependency_chain_runs_in_order() {
    let coordinator = coordinator();
    coordinator.register_agent(ScriptedWorker::new("worker", "done"), vec![]);
    let first = create(&coordinator, "extract", TaskPriority::Low, vec![]);
    let second = create(&coordinator, "transform", TaskPriority::Critical, vec![first]);
    let third = create(&coordinator, "load", TaskPriority::Critical, vec![second]);

    let mut passes = 0;
    while coordinator
        .get_task_status()
        .iter()
        .any(|t| !t.status.is_terminal())
    {
        coordinator.assign_tasks();
        coordinator.process_tasks().await;
        assert_invariants(&coordinator);
        passes += 1;
        assert!(passes <= 5, "chain did not drain");
    }
    assert_eq!(passes, 3);

    let a = coordinator.get_task(first).unwrap().completed_at.unwrap();
    let b = coordinator.get_task(second).unwrap().completed_at.unwrap();
    let c = coordinator.get_task(third).unwrap().completed_at.unwrap();
    assert!(a <= b && b <= c);
    assert_eq!(
        coordinator.get_task(third).unwrap().result,
        Some(serde_json::json!({ "response": "done" }))
    );
}

// ---------------------------------------------------------------------------
// 3. Unregistration resets held tasks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unregister_resets_every_held_task() {
    let coordinator = coordinator();
    coordinator.register_agent(ScriptedWorker::new("solo", "ok"), vec![]);
    let ids: Vec<TaskId> = (0..3)
        .map(|i| create(&coordinator, &format!("t{i}"), TaskPriority::Medium, vec![]))
        .collect();
    assert_eq!(coordinator.assign_tasks(), 3);
    assert!(coordinator.update_task_status(ids[0], TaskStatus::InProgress, None, None));
    assert_eq!(coordinator.get_agent_status()["solo"].current_load, 3);

    assert!(coordinator.unregister_agent("solo"));
    assert!(!coordinator.get_agent_status().contains_key("solo"));
    for id in &ids {
        let task = coordinator.get_task(*id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.assigned_agent.is_none());
        assert_eq!(in_any_lane(&coordinator, *id), 1);
    }

    let destroyed = coordinator
        .monitoring()
        .get_events(&EventQuery::new().of_type(EventType::AgentDestroyed));
    assert_eq!(destroyed.len(), 1);
    assert_eq!(destroyed[0].data["reset_tasks"], 3);
    assert_invariants(&coordinator);

    // Nothing is left for the departed agent to run.
    assert_eq!(coordinator.process_tasks().await.processed, 0);
}

#[test]
fn caller_cannot_start_unassigned_task() {
    let coordinator = coordinator();
    let id = create(&coordinator, "t", TaskPriority::Medium, vec![]);
    assert!(!coordinator.update_task_status(id, TaskStatus::Assigned, None, None));
    assert!(!coordinator.update_task_status(id, TaskStatus::InProgress, None, None));
    assert_invariants(&coordinator);
}

// ---------------------------------------------------------------------------
// 4. Dispatch outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn worker_error_marks_task_failed() {
    let coordinator = coordinator();
    coordinator.register_agent(Arc::new(FailingWorker), vec![]);
    let id = create(&coordinator, "Verify eligibility", TaskPriority::Medium, vec![]);
    coordinator.assign_tasks();

    let report = coordinator.process_tasks().await;
    assert_eq!((report.processed, report.completed, report.failed), (1, 0, 1));
    assert_eq!(report.details[0].status, TaskStatus::Failed);

    let task = coordinator.get_task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.result.is_none());
    assert!(task.error.unwrap().contains("cannot handle Verify eligibility"));

    let monitoring = coordinator.monitoring();
    let errors = monitoring.get_events(&EventQuery::new().of_type(EventType::Error));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source, "agent:flaky");
    let error_metrics = monitoring.get_metrics(&MetricQuery::new().named("error").with_label("source", "agent:flaky"));
    assert_eq!(error_metrics["error"].len(), 1);
    assert_eq!(coordinator.get_agent_status()["flaky"].activity, WorkerState::Error);

    // No retry: the next pass leaves it alone.
    coordinator.assign_tasks();
    assert_eq!(coordinator.process_tasks().await.processed, 0);
}

#[tokio::test]
async fn worker_panic_marks_task_failed_and_pass_continues() {
    let coordinator = coordinator();
    coordinator.register_agent(Arc::new(PanickingWorker), vec![]);
    let first = create(&coordinator, "Summarize notes", TaskPriority::High, vec![]);
    let second = create(&coordinator, "Book appointment", TaskPriority::Low, vec![]);
    assert_eq!(coordinator.assign_tasks(), 2);

    let report = coordinator.process_tasks().await;
    assert_eq!((report.processed, report.completed, report.failed), (2, 0, 2));

    for id in [first, second] {
        let task = coordinator.get_task(id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.assigned_agent.is_none());
        assert!(task.error.unwrap().contains("worker panicked"));
    }
    assert!(coordinator
        .get_task(first)
        .unwrap()
        .error
        .unwrap()
        .contains("exploded on Summarize notes"));
    assert_eq!(coordinator.get_agent_status()["panicky"].current_load, 0);

    let errors = coordinator
        .monitoring()
        .get_events(&EventQuery::new().of_type(EventType::Error));
    assert_eq!(errors.len(), 2);
    assert_invariants(&coordinator);

    assert_eq!(coordinator.process_tasks().await.processed, 0);
}

#[tokio::test]
async fn response_time_recorded_per_agent() {
    let coordinator = coordinator();
    coordinator.register_agent(ScriptedWorker::new("fast", "plain text"), vec![]);
    for i in 0..3 {
        create(&coordinator, &format!("t{i}"), TaskPriority::Medium, vec![]);
    }
    coordinator.assign_tasks();
    let report = coordinator.process_tasks().await;
    assert_eq!(report.completed, 3);

    let samples = coordinator
        .monitoring()
        .get_metrics(&MetricQuery::new().named("response_time").with_label("agent_id", "fast"));
    assert_eq!(samples["response_time"].len(), 3);
    assert_eq!(coordinator.get_agent_status()["fast"].current_load, 0);

    let started = coordinator
        .monitoring()
        .get_events(&EventQuery::new().of_type(EventType::TaskStarted));
    assert_eq!(started.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_result_discarded_after_unregister() {
    let coordinator = coordinator();
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    coordinator.register_agent(
        Arc::new(GatedWorker {
            started: Arc::clone(&started),
            release: Arc::clone(&release),
        }),
        vec![],
    );
    let id = create(&coordinator, "slow", TaskPriority::Medium, vec![]);
    coordinator.assign_tasks();

    let pass = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.process_tasks().await })
    };
    started.notified().await;
    assert_eq!(coordinator.get_task(id).unwrap().status, TaskStatus::InProgress);

    // The state lock is free while the worker call is suspended.
    assert!(coordinator.unregister_agent("gated"));
    release.notify_one();

    let report = tokio::time::timeout(Duration::from_secs(5), pass)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.completed, 0);
    assert_eq!(report.details[0].status, TaskStatus::Pending);

    let task = coordinator.get_task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.result.is_none());
    assert_eq!(in_any_lane(&coordinator, id), 1);
    assert_invariants(&coordinator);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_passes_are_serialized() {
    let coordinator = coordinator();
    let worker = ScriptedWorker::new("solo", "ok");
    coordinator.register_agent(worker.clone(), vec![]);
    for i in 0..4 {
        create(&coordinator, &format!("t{i}"), TaskPriority::Medium, vec![]);
    }
    coordinator.assign_tasks();

    let a = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.process_tasks().await }
    });
    let b = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.process_tasks().await }
    });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert_eq!(a.processed + b.processed, 4);
    assert_eq!(worker.calls.load(Ordering::SeqCst), 4);
}

// ---------------------------------------------------------------------------
// 5. Event handlers may call back into the coordinator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handler_reads_coordinator_during_publish() {
    let coordinator = coordinator();
    let seen = Arc::new(AtomicUsize::new(0));
    {
        let coordinator_ref = Arc::clone(&coordinator);
        let seen = Arc::clone(&seen);
        coordinator.monitoring().register_event_handler(
            "dashboard",
            vec![EventType::TaskCompleted],
            Arc::new(move |event: &Event| {
                let id: TaskId = serde_json::from_value(event.data["task_id"].clone())?;
                let task = coordinator_ref
                    .get_task(id)
                    .ok_or_else(|| SwitchyardError::Task("missing".into()))?;
                assert_eq!(task.status, TaskStatus::Completed);
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
    }
    coordinator.register_agent(ScriptedWorker::new("w", "{}"), vec![]);
    create(&coordinator, "t", TaskPriority::Medium, vec![]);
    coordinator.assign_tasks();
    coordinator.process_tasks().await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}
