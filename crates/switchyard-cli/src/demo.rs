//! Simulated worker pool used by `switchyard demo`.

use crate::config::SwitchyardConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchyard_coordinator::{
    AgentCapability, Coordinator, TaskEnvelope, TaskId, TaskPriority, Worker,
};
use switchyard_core::{SwitchyardError, SwitchyardResult};
use switchyard_monitor::MonitoringSystem;
use tracing::info;

/// Capability name, task name template and priority for each simulated specialty.
const SPECIALTIES: [(&str, &str, TaskPriority); 4] = [
    ("billing", "Process billing claim", TaskPriority::High),
    ("appointment", "Book follow-up appointment", TaskPriority::Medium),
    ("intake", "Summarize intake notes", TaskPriority::Low),
    ("insurance", "Verify insurance eligibility", TaskPriority::Critical),
];

#[derive(Debug, Clone, Copy)]
pub struct DemoOptions {
    pub tasks: usize,
    pub workers: usize,
    /// Every k-th call of a worker fails; 0 disables failures.
    pub fail_every: usize,
}

/// A worker that sleeps briefly and answers with canned output.
struct SimulatedWorker {
    name: String,
    fail_every: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl Worker for SimulatedWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, envelope: TaskEnvelope) -> SwitchyardResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.fail_every > 0 && call % self.fail_every == 0 {
            return Err(SwitchyardError::Worker(format!(
                "{} gave up on '{}'",
                self.name, envelope.name
            )));
        }
        if call % 2 == 0 {
            Ok(format!("{} handled '{}'", self.name, envelope.name))
        } else {
            Ok(serde_json::json!({ "worker": self.name, "task": envelope.name }).to_string())
        }
    }
}

/// Run a simulated pool until every task is terminal or a pass makes no progress.
///
/// Returns a JSON report of the final task, queue, agent and metric state.
pub async fn run_demo(
    config: &SwitchyardConfig,
    options: DemoOptions,
) -> anyhow::Result<serde_json::Value> {
    let monitoring = Arc::new(MonitoringSystem::new(&config.monitoring)?);
    monitoring.register_performance_aggregations()?;
    monitoring.start();
    let coordinator = Coordinator::new(config.coordinator.clone(), Arc::clone(&monitoring))?;

    for i in 0..options.workers.max(1) {
        let (capability, _, _) = SPECIALTIES[i % SPECIALTIES.len()];
        let name = format!("{capability}-{i}");
        monitoring.register_agent_aggregations(&name)?;
        coordinator.register_agent(
            Arc::new(SimulatedWorker {
                name,
                fail_every: options.fail_every,
                calls: AtomicUsize::new(0),
            }),
            vec![AgentCapability::new(
                capability,
                format!("Handles {capability} work"),
                0.6 + 0.1 * (i % 4) as f64,
            )],
        );
    }

    let mut previous: Option<TaskId> = None;
    for i in 0..options.tasks {
        let (_, template, priority) = SPECIALTIES[i % SPECIALTIES.len()];
        // Every third task depends on the one created before it.
        let dependencies = match previous {
            Some(dep) if i % 3 == 2 => vec![dep],
            _ => vec![],
        };
        let id = coordinator.create_task(
            format!("{template} #{i}"),
            format!("Simulated {template} request"),
            priority,
            dependencies,
            serde_json::json!({ "sequence": i }),
            HashMap::new(),
        );
        previous = Some(id);
    }

    let mut passes = 0;
    loop {
        let assigned = coordinator.assign_tasks();
        let report = coordinator.process_tasks().await;
        passes += 1;
        let unfinished = coordinator
            .get_task_status()
            .iter()
            .filter(|t| !t.status.is_terminal())
            .count();
        info!(pass = passes, assigned, processed = report.processed, unfinished, "Demo pass");
        if unfinished == 0 || (assigned == 0 && report.processed == 0) {
            break;
        }
    }

    monitoring.aggregate_now();
    monitoring.shutdown().await;
    let report = serde_json::json!({
        "passes": passes,
        "summary": coordinator.summary(),
        "tasks": coordinator.get_task_status(),
        "queues": coordinator.get_queue_status(),
        "agents": coordinator.get_agent_status(),
        "aggregated_metrics": monitoring.get_aggregated_metrics(&[]),
        "monitoring": monitoring.summary(),
    });
    Ok(report)
}
