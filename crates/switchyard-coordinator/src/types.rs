use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Identifier of a task. Dependencies refer to tasks by this id.
pub type TaskId = Uuid;

/// Priority lane of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    /// Lanes in the order the scheduler drains them.
    pub const SCHEDULING_ORDER: [TaskPriority; 4] = [
        TaskPriority::Critical,
        TaskPriority::High,
        TaskPriority::Medium,
        TaskPriority::Low,
    ];
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Completed, failed and cancelled tasks never run again unless reset.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// States in which a task must carry an `assigned_agent`.
    pub fn holds_agent(&self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::InProgress)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Assigned => write!(f, "assigned"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A schedulable unit of work.
///
/// `assigned_agent` is a registry key, never a handle: it is set exactly while
/// the task is ASSIGNED or IN_PROGRESS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(name: impl Into<String>, description: impl Into<String>, priority: TaskPriority) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            priority,
            status: TaskStatus::Pending,
            assigned_agent: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            dependencies: Vec::new(),
            data: serde_json::Value::Null,
            result: None,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the dependency list, dropping duplicates but keeping first-seen order.
    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        let mut unique = Vec::with_capacity(deps.len());
        for dep in deps {
            if !unique.contains(&dep) {
                unique.push(dep);
            }
        }
        self.dependencies = unique;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Apply a status with a timestamp that never moves backwards.
    ///
    /// Keeps `completed_at` set exactly while the task is COMPLETED.
    pub(crate) fn transition(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = self.updated_at.max(now);
        self.completed_at = if status == TaskStatus::Completed {
            Some(self.updated_at)
        } else {
            None
        };
    }

    /// The envelope handed to a worker.
    pub fn envelope(&self) -> TaskEnvelope {
        TaskEnvelope {
            task_id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            data: self.data.clone(),
        }
    }
}

/// A declared strength of a worker, matched against task keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCapability {
    pub name: String,
    pub description: String,
    /// Declared strength in `[0, 1]`.
    pub score: f64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentCapability {
    /// Creates a capability; `score` is clamped into `[0, 1]` (NaN becomes 0).
    pub fn new(name: impl Into<String>, description: impl Into<String>, score: f64) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self {
            name: name.into(),
            description: description.into(),
            score,
            metadata: HashMap::new(),
        }
    }
}

/// Coarse state signal of a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    #[default]
    Idle,
    Processing,
    Error,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Processing => write!(f, "processing"),
            WorkerState::Error => write!(f, "error"),
        }
    }
}

/// Opaque payload handed to a worker. The coordinator never inspects `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_id: TaskId,
    pub name: String,
    pub description: String,
    pub data: serde_json::Value,
}

/// Per-task entry of a [`ProcessReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub agent: String,
    pub status: TaskStatus,
    pub processing_time_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one `process_tasks` pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessReport {
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
    pub details: Vec<TaskOutcome>,
}

/// Dashboard view of a registered agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub name: String,
    /// State reported by the worker itself.
    pub state: WorkerState,
    /// Last state the coordinator observed while dispatching to it.
    pub activity: WorkerState,
    pub current_load: u32,
    pub capabilities: Vec<String>,
    pub registered_at: DateTime<Utc>,
}

/// Dashboard view of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dependencies_count: usize,
    pub has_result: bool,
    pub has_error: bool,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            status: task.status,
            priority: task.priority,
            assigned_agent: task.assigned_agent.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
            completed_at: task.completed_at,
            dependencies_count: task.dependencies.len(),
            has_result: task.result.is_some(),
            has_error: task.error.is_some(),
        }
    }
}

/// Counts for the whole coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorSummary {
    pub name: String,
    pub agents_count: usize,
    pub tasks_count: usize,
    pub pending_tasks: usize,
    pub agent_capabilities: HashMap<String, Vec<String>>,
}
