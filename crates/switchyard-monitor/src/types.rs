use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use switchyard_core::Labels;
use uuid::Uuid;

/// Closed taxonomy of events recorded by the coordinator and its workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A worker was registered with a coordinator.
    AgentCreated,
    /// A worker was unregistered.
    AgentDestroyed,
    /// A worker moved between idle, processing and error.
    AgentStateChanged,
    /// A task was created.
    TaskCreated,
    /// A task was handed to its worker.
    TaskStarted,
    /// A task reached COMPLETED.
    TaskCompleted,
    /// A task reached FAILED.
    TaskFailed,
    /// A task reached CANCELLED.
    TaskCancelled,
    /// A worker executed a tool.
    ToolExecuted,
    /// A worker stored a memory entry.
    MemoryAdded,
    /// A worker read a memory entry.
    MemoryRetrieved,
    /// Something failed.
    Error,
    /// Something looks wrong but processing continued.
    Warning,
    /// Informational activity (e.g. task assignment).
    Info,
    /// Caller-defined event.
    Custom,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventType::AgentCreated => "agent_created",
            EventType::AgentDestroyed => "agent_destroyed",
            EventType::AgentStateChanged => "agent_state_changed",
            EventType::TaskCreated => "task_created",
            EventType::TaskStarted => "task_started",
            EventType::TaskCompleted => "task_completed",
            EventType::TaskFailed => "task_failed",
            EventType::TaskCancelled => "task_cancelled",
            EventType::ToolExecuted => "tool_executed",
            EventType::MemoryAdded => "memory_added",
            EventType::MemoryRetrieved => "memory_retrieved",
            EventType::Error => "error",
            EventType::Warning => "warning",
            EventType::Info => "info",
            EventType::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Severity attached to an [`Event`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

/// An immutable record appended to the event store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: EventSeverity,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    pub fn new(event_type: EventType, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            severity: EventSeverity::default(),
            timestamp: Utc::now(),
            source: source.into(),
            data: serde_json::Value::Object(serde_json::Map::new()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
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
}

/// Kind of a metric sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    #[default]
    Gauge,
    Histogram,
    Summary,
}

/// A single immutable metric sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Metric {
    pub fn new(name: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            timestamp: Utc::now(),
            labels: Labels::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Override the sample time (used when replaying or backfilling samples).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Statistic computed over the samples inside an aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunction {
    Sum,
    #[serde(alias = "mean")]
    Avg,
    Min,
    Max,
    Count,
}

impl AggregationFunction {
    /// Apply the function to a non-empty sample set.
    ///
    /// Returns `None` for an empty slice.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let value = match self {
            AggregationFunction::Sum => values.iter().sum(),
            AggregationFunction::Avg => values.iter().sum::<f64>() / values.len() as f64,
            AggregationFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregationFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationFunction::Count => values.len() as f64,
        };
        Some(value)
    }
}

impl std::fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationFunction::Sum => write!(f, "sum"),
            AggregationFunction::Avg => write!(f, "avg"),
            AggregationFunction::Min => write!(f, "min"),
            AggregationFunction::Max => write!(f, "max"),
            AggregationFunction::Count => write!(f, "count"),
        }
    }
}

/// The latest computed value of a registered aggregation.
///
/// Overwritten on every successful recomputation; never appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedValue {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    /// Window length in seconds.
    pub window: f64,
    pub sample_count: usize,
}

/// A registered aggregation spec together with its current snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MetricAggregation {
    pub name: String,
    pub metric_name: String,
    pub function: AggregationFunction,
    #[serde(with = "window_secs")]
    pub window: Duration,
    pub labels: Labels,
    pub snapshot: Option<AggregatedValue>,
}

mod window_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(window: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(window.as_secs_f64())
    }
}
