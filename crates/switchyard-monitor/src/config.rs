use crate::types::AggregationFunction;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use switchyard_core::{Labels, SwitchyardError, SwitchyardResult};

/// A declarative aggregation registered when the monitoring system starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub name: String,
    pub metric_name: String,
    pub function: AggregationFunction,
    pub window_secs: u64,
    #[serde(default)]
    pub labels: Labels,
}

impl AggregationSpec {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Capacities and timing for the event/metric stores and the aggregation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_max_metrics")]
    pub max_metrics_per_name: usize,
    #[serde(default = "default_interval_ms")]
    pub aggregation_interval_ms: u64,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Register the standard response-time, task and error aggregations.
    #[serde(default)]
    pub performance_presets: bool,
    #[serde(default)]
    pub aggregations: Vec<AggregationSpec>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            max_metrics_per_name: default_max_metrics(),
            aggregation_interval_ms: default_interval_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            performance_presets: false,
            aggregations: Vec::new(),
        }
    }
}

impl MonitoringConfig {
    pub fn aggregation_interval(&self) -> Duration {
        Duration::from_millis(self.aggregation_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Reject configurations the stores and loop cannot run with.
    pub fn validate(&self) -> SwitchyardResult<()> {
        if self.max_events == 0 {
            return Err(SwitchyardError::Config("max_events must be > 0".into()));
        }
        if self.max_metrics_per_name == 0 {
            return Err(SwitchyardError::Config(
                "max_metrics_per_name must be > 0".into(),
            ));
        }
        if self.aggregation_interval_ms == 0 {
            return Err(SwitchyardError::Config(
                "aggregation_interval_ms must be > 0".into(),
            ));
        }
        for spec in &self.aggregations {
            if spec.name.trim().is_empty() || spec.metric_name.trim().is_empty() {
                return Err(SwitchyardError::Config(format!(
                    "Aggregation '{}' needs both a name and a metric_name",
                    spec.name
                )));
            }
        }
        Ok(())
    }
}

fn default_max_events() -> usize {
    10_000
}
fn default_max_metrics() -> usize {
    10_000
}
fn default_interval_ms() -> u64 {
    1_000
}
fn default_shutdown_timeout_ms() -> u64 {
    5_000
}
