use crate::aggregation::{AggregationEngine, EngineState};
use crate::config::MonitoringConfig;
use crate::events::{EventCallback, EventQuery, EventStore};
use crate::metrics::{MetricQuery, MetricStore};
use crate::types::{
    AggregatedValue, AggregationFunction, Event, EventSeverity, EventType, Metric, MetricKind,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::{Labels, SwitchyardResult};
use uuid::Uuid;

/// Metric name for worker processing time, in seconds.
pub const RESPONSE_TIME: &str = "response_time";
/// Counter incremented when an assigned task completes.
pub const TASK_COMPLETED: &str = "task_completed";
/// Counter incremented when an assigned task fails.
pub const TASK_FAILED: &str = "task_failed";
/// Counter incremented for every recorded error.
pub const ERROR: &str = "error";

/// Counts exposed to dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSummary {
    pub events_count: usize,
    pub metrics_count: usize,
    pub event_handlers: usize,
    pub metric_aggregations: usize,
    pub aggregated_metrics: usize,
    pub aggregation_state: EngineState,
}

/// Owns the event store, the metric store and the aggregation engine.
///
/// Construct one per coordinator and share it by `Arc`; there is no global
/// instance.
pub struct MonitoringSystem {
    events: EventStore,
    metrics: Arc<MetricStore>,
    aggregation: Arc<AggregationEngine>,
}

impl MonitoringSystem {
    /// Build the stores and register every configured aggregation.
    ///
    /// The background loop is not started; call [`MonitoringSystem::start`]
    /// from inside a tokio runtime.
    pub fn new(config: &MonitoringConfig) -> SwitchyardResult<Self> {
        config.validate()?;
        let metrics = Arc::new(MetricStore::new(config.max_metrics_per_name));
        let aggregation = Arc::new(AggregationEngine::new(
            Arc::clone(&metrics),
            config.aggregation_interval(),
            config.shutdown_timeout(),
        ));
        let system = Self {
            events: EventStore::new(config.max_events),
            metrics,
            aggregation,
        };

        if config.performance_presets {
            system.register_performance_aggregations()?;
        }
        for spec in &config.aggregations {
            system.register_metric_aggregation(
                &spec.name,
                &spec.metric_name,
                spec.function,
                spec.window(),
                spec.labels.clone(),
            )?;
        }
        Ok(system)
    }

    /// Spawn the aggregation loop. Returns `false` if it is already running or stopped.
    pub fn start(&self) -> bool {
        self.aggregation.spawn()
    }

    /// Stop the aggregation loop, waiting at most the configured timeout.
    pub async fn shutdown(&self) -> bool {
        self.aggregation.shutdown().await
    }

    // --- Events ---

    pub fn record_event(
        &self,
        event_type: EventType,
        source: impl Into<String>,
        data: serde_json::Value,
        severity: EventSeverity,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Event {
        self.emit(
            Event::new(event_type, source)
                .with_data(data)
                .with_severity(severity)
                .with_metadata(metadata),
        )
    }

    /// Record a pre-built event.
    pub fn emit(&self, event: Event) -> Event {
        self.events.record(event)
    }

    pub fn register_event_handler(
        &self,
        name: impl Into<String>,
        event_types: Vec<EventType>,
        callback: EventCallback,
    ) -> Uuid {
        self.events.register_handler(name, event_types, callback)
    }

    pub fn unregister_event_handler(&self, id: Uuid) -> bool {
        self.events.unregister_handler(id)
    }

    pub fn get_events(&self, query: &EventQuery) -> Vec<Event> {
        self.events.query(query)
    }

    // --- Metrics ---

    pub fn record_metric(
        &self,
        name: impl Into<String>,
        value: f64,
        kind: MetricKind,
        labels: Labels,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Metric {
        self.metrics.record(
            Metric::new(name, kind, value)
                .with_labels(labels)
                .with_metadata(metadata),
        )
    }

    /// Record a pre-built metric sample.
    pub fn record(&self, metric: Metric) -> Metric {
        self.metrics.record(metric)
    }

    pub fn get_metrics(&self, query: &MetricQuery) -> HashMap<String, Vec<Metric>> {
        self.metrics.query(query)
    }

    // --- Aggregations ---

    pub fn register_metric_aggregation(
        &self,
        name: impl Into<String>,
        metric_name: impl Into<String>,
        function: AggregationFunction,
        window: Duration,
        labels: Labels,
    ) -> SwitchyardResult<()> {
        self.aggregation
            .register(name, metric_name, function, window, labels)
    }

    pub fn unregister_metric_aggregation(&self, name: &str) -> bool {
        self.aggregation.unregister(name)
    }

    /// Latest snapshots; an empty `names` slice returns all of them.
    pub fn get_aggregated_metrics(&self, names: &[String]) -> HashMap<String, AggregatedValue> {
        self.aggregation.snapshots(names)
    }

    /// Run one aggregation pass immediately, outside the background tick.
    pub fn aggregate_now(&self) -> usize {
        self.aggregation.aggregate_at(chrono::Utc::now())
    }

    pub fn aggregation_engine(&self) -> &Arc<AggregationEngine> {
        &self.aggregation
    }

    /// Response-time averages over 1m/5m/1h plus task and error counts.
    pub fn register_performance_aggregations(&self) -> SwitchyardResult<()> {
        let minute = Duration::from_secs(60);
        let presets = [
            ("avg_response_time_1m", RESPONSE_TIME, AggregationFunction::Avg, minute),
            ("avg_response_time_5m", RESPONSE_TIME, AggregationFunction::Avg, minute * 5),
            ("avg_response_time_1h", RESPONSE_TIME, AggregationFunction::Avg, minute * 60),
            ("tasks_completed_1m", TASK_COMPLETED, AggregationFunction::Count, minute),
            ("tasks_failed_1m", TASK_FAILED, AggregationFunction::Count, minute),
            ("error_rate_5m", ERROR, AggregationFunction::Count, minute * 5),
        ];
        for (name, metric, function, window) in presets {
            self.register_metric_aggregation(name, metric, function, window, Labels::new())?;
        }
        Ok(())
    }

    /// Five-minute response time, completions and errors for one agent.
    pub fn register_agent_aggregations(&self, agent_id: &str) -> SwitchyardResult<()> {
        let window = Duration::from_secs(300);
        let by_agent: Labels = [("agent_id".to_string(), agent_id.to_string())].into();
        self.register_metric_aggregation(
            format!("agent_{agent_id}_avg_response_time_5m"),
            RESPONSE_TIME,
            AggregationFunction::Avg,
            window,
            by_agent.clone(),
        )?;
        self.register_metric_aggregation(
            format!("agent_{agent_id}_tasks_completed_5m"),
            TASK_COMPLETED,
            AggregationFunction::Count,
            window,
            by_agent,
        )?;
        let by_source: Labels = [("source".to_string(), format!("agent:{agent_id}"))].into();
        self.register_metric_aggregation(
            format!("agent_{agent_id}_error_rate_5m"),
            ERROR,
            AggregationFunction::Count,
            window,
            by_source,
        )
    }

    // --- Helper recorders ---

    /// Record an INFO event from `agent:<agent_id>` describing an activity.
    pub fn log_agent_activity(&self, agent_id: &str, activity: &str, data: serde_json::Value) {
        let mut payload = match data {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".into(), other);
                map
            }
        };
        payload.insert("activity".into(), activity.into());
        self.emit(
            Event::new(EventType::Info, format!("agent:{agent_id}"))
                .with_data(serde_json::Value::Object(payload)),
        );
    }

    pub fn record_response_time(&self, agent_id: &str, seconds: f64) {
        self.record(
            Metric::new(RESPONSE_TIME, MetricKind::Histogram, seconds).with_label("agent_id", agent_id),
        );
    }

    pub fn record_task_completion(&self, agent_id: &str, task_id: &str, success: bool) {
        let name = if success { TASK_COMPLETED } else { TASK_FAILED };
        self.record(
            Metric::new(name, MetricKind::Counter, 1.0)
                .with_label("agent_id", agent_id)
                .with_label("task_id", task_id),
        );
    }

    /// Record an ERROR event plus an `error` counter labelled with `source`.
    pub fn record_error(&self, source: &str, message: &str, severity: EventSeverity) {
        self.emit(
            Event::new(EventType::Error, source)
                .with_severity(severity)
                .with_data(serde_json::json!({ "message": message })),
        );
        self.record(Metric::new(ERROR, MetricKind::Counter, 1.0).with_label("source", source));
    }

    pub fn summary(&self) -> MonitoringSummary {
        MonitoringSummary {
            events_count: self.events.len(),
            metrics_count: self.metrics.total_samples(),
            event_handlers: self.events.handler_count(),
            metric_aggregations: self.aggregation.aggregation_count(),
            aggregated_metrics: self.aggregation.snapshots(&[]).len(),
            aggregation_state: self.aggregation.state(),
        }
    }
}
