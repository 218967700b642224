//! Observability engine for the Switchyard coordinator.
//!
//! Keeps a bounded history of immutable events and per-name metric samples,
//! dispatches events to registered handlers, and runs a background loop that
//! recomputes windowed aggregations over the metric history.
//!
//! # Main types
//!
//! - [`MonitoringSystem`] — Façade owning the stores and the aggregation engine.
//! - [`EventStore`] — Ring buffer of [`Event`]s plus typed event handlers.
//! - [`MetricStore`] — Independent ring buffer per metric name.
//! - [`AggregationEngine`] — Registered aggregations and their latest snapshots.
//! - [`MonitoringConfig`] — Capacities, tick interval and preset aggregations.

/// Windowed aggregation engine and its background loop.
pub mod aggregation;
/// Monitoring configuration.
pub mod config;
/// Event ring buffer and handler dispatch.
pub mod events;
/// Per-name metric ring buffers.
pub mod metrics;
/// Monitoring façade and helper recorders.
pub mod system;
/// Event, metric and aggregation records.
pub mod types;

pub use aggregation::{AggregationEngine, EngineState};
pub use config::{AggregationSpec, MonitoringConfig};
pub use events::{EventCallback, EventQuery, EventStore};
pub use metrics::{MetricQuery, MetricStore};
pub use system::{MonitoringSummary, MonitoringSystem};
pub use types::{
    AggregatedValue, AggregationFunction, Event, EventSeverity, EventType, Metric, MetricAggregation,
    MetricKind,
};
