use crate::metrics::MetricStore;
use crate::types::{AggregatedValue, AggregationFunction, MetricAggregation};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use switchyard_core::{Labels, SwitchyardError, SwitchyardResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Lifecycle of the aggregation engine. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Running,
    Stopped,
}

/// Registered metric aggregations plus the background loop that refreshes them.
///
/// Each tick, every aggregation selects the samples of its source metric
/// inside `[now - window, now]` that match its label filter. A non-empty
/// selection overwrites the snapshot; an empty one leaves the previous
/// snapshot in place, so aggregates go stale rather than dropping to zero.
pub struct AggregationEngine {
    metrics: Arc<MetricStore>,
    aggregations: RwLock<Vec<MetricAggregation>>,
    state: Mutex<EngineState>,
    interval: Duration,
    shutdown_timeout: Duration,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AggregationEngine {
    pub fn new(metrics: Arc<MetricStore>, interval: Duration, shutdown_timeout: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            metrics,
            aggregations: RwLock::new(Vec::new()),
            state: Mutex::new(EngineState::Running),
            // tokio::time::interval panics on a zero period
            interval: interval.max(Duration::from_millis(1)),
            shutdown_timeout,
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Register (or replace) an aggregation. Nothing is computed until the next pass.
    pub fn register(
        &self,
        name: impl Into<String>,
        metric_name: impl Into<String>,
        function: AggregationFunction,
        window: Duration,
        labels: Labels,
    ) -> SwitchyardResult<()> {
        let name = name.into();
        chrono::Duration::from_std(window).map_err(|e| {
            SwitchyardError::Aggregation(format!("Window for '{name}' is out of range: {e}"))
        })?;

        let aggregation = MetricAggregation {
            name: name.clone(),
            metric_name: metric_name.into(),
            function,
            window,
            labels,
            snapshot: None,
        };

        let mut aggregations = self.aggregations.write();
        if let Some(existing) = aggregations.iter_mut().find(|a| a.name == name) {
            debug!(aggregation = %name, "Replacing metric aggregation");
            *existing = aggregation;
        } else {
            aggregations.push(aggregation);
        }
        Ok(())
    }

    /// Remove an aggregation and its snapshot.
    pub fn unregister(&self, name: &str) -> bool {
        let mut aggregations = self.aggregations.write();
        let before = aggregations.len();
        aggregations.retain(|a| a.name != name);
        aggregations.len() != before
    }

    pub fn aggregations(&self) -> Vec<MetricAggregation> {
        self.aggregations.read().clone()
    }

    pub fn aggregation_count(&self) -> usize {
        self.aggregations.read().len()
    }

    /// Current snapshots. An empty `names` slice returns every computed snapshot;
    /// otherwise only the named ones that have been computed at least once.
    pub fn snapshots(&self, names: &[String]) -> HashMap<String, AggregatedValue> {
        self.aggregations
            .read()
            .iter()
            .filter(|a| names.is_empty() || names.contains(&a.name))
            .filter_map(|a| a.snapshot.clone().map(|s| (a.name.clone(), s)))
            .collect()
    }

    /// Run one aggregation pass as of `now`. Returns how many snapshots were overwritten.
    ///
    /// A failing aggregation is logged and skipped; the others still run.
    /// Does nothing once the engine is stopped.
    pub fn aggregate_at(&self, now: DateTime<Utc>) -> usize {
        let mut aggregations = self.aggregations.write();
        let mut updated = 0;
        for aggregation in aggregations.iter_mut() {
            if self.state() == EngineState::Stopped {
                break;
            }
            match self.compute(aggregation, now) {
                Ok(Some(snapshot)) => {
                    aggregation.snapshot = Some(snapshot);
                    updated += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(aggregation = %aggregation.name, error = %e, "Metric aggregation failed");
                }
            }
        }
        updated
    }

    fn compute(
        &self,
        aggregation: &MetricAggregation,
        now: DateTime<Utc>,
    ) -> SwitchyardResult<Option<AggregatedValue>> {
        let window = chrono::Duration::from_std(aggregation.window)
            .map_err(|e| SwitchyardError::Aggregation(e.to_string()))?;
        let start = now
            .checked_sub_signed(window)
            .ok_or_else(|| SwitchyardError::Aggregation("window start underflows".into()))?;

        let values =
            self.metrics
                .values_between(&aggregation.metric_name, start, now, &aggregation.labels);
        let Some(value) = aggregation.function.apply(&values) else {
            return Ok(None);
        };
        if !value.is_finite() {
            return Err(SwitchyardError::Aggregation(format!(
                "{} over '{}' produced a non-finite value",
                aggregation.function, aggregation.metric_name
            )));
        }

        Ok(Some(AggregatedValue {
            name: aggregation.name.clone(),
            value,
            timestamp: now,
            window: aggregation.window.as_secs_f64(),
            sample_count: values.len(),
        }))
    }

    /// Spawn the background loop on the current tokio runtime.
    ///
    /// Returns `false` if the loop is already running or the engine is stopped.
    /// The loop holds only a weak reference, so dropping the last `Arc` ends it.
    pub fn spawn(self: &Arc<Self>) -> bool {
        let mut handle = self.handle.lock();
        if handle.is_some() || self.state() == EngineState::Stopped {
            return false;
        }

        let engine: Weak<Self> = Arc::downgrade(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = self.interval;

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(engine) = engine.upgrade() else { break };
                        if engine.state() == EngineState::Stopped {
                            break;
                        }
                        let updated = engine.aggregate_at(Utc::now());
                        debug!(updated, "Aggregation pass complete");
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("Aggregation loop stopped");
        }));

        info!(interval_ms = period.as_millis() as u64, "Aggregation loop started");
        true
    }

    /// Stop the engine and wait (bounded) for the loop to exit.
    ///
    /// Returns `false` if the loop had to be aborted after the timeout.
    pub async fn shutdown(&self) -> bool {
        *self.state.lock() = EngineState::Stopped;
        self.shutdown_tx.send_replace(true);

        let handle = self.handle.lock().take();
        let Some(handle) = handle else {
            return true;
        };

        let abort = handle.abort_handle();
        match tokio::time::timeout(self.shutdown_timeout, handle).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "Aggregation loop did not stop in time, aborting"
                );
                abort.abort();
                false
            }
        }
    }
}
