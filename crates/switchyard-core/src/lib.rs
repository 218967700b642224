//! Core types and error definitions for the Switchyard workspace.
//!
//! This crate provides the foundational types shared by the coordinator and
//! monitoring crates: the unified error enum, its result alias, and the label
//! map used to tag metrics.
//!
//! # Main types
//!
//! - [`SwitchyardError`] — Unified error enum for all Switchyard subsystems.
//! - [`SwitchyardResult`] — Convenience alias for `Result<T, SwitchyardError>`.
//! - [`Labels`] — String key/value tags attached to metrics and filters.

use std::collections::HashMap;

// --- Error types ---

/// Top-level error type for the Switchyard workspace.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum SwitchyardError {
    /// A task lookup or lifecycle transition was rejected.
    #[error("Task error: {0}")]
    Task(String),

    /// An error related to agent registration or lookup.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error raised by a worker while processing a task envelope.
    #[error("Worker error: {0}")]
    Worker(String),

    /// An error from the event or metric stores.
    #[error("Monitoring error: {0}")]
    Monitoring(String),

    /// An error while registering or computing a metric aggregation.
    #[error("Aggregation error: {0}")]
    Aggregation(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`SwitchyardError`].
pub type SwitchyardResult<T> = Result<T, SwitchyardError>;

/// String tags attached to a metric sample or used as an aggregation filter.
pub type Labels = HashMap<String, String>;

/// Returns `true` when every `(key, value)` pair of `filter` is present in `labels`.
///
/// An empty filter matches everything.
pub fn labels_match(labels: &Labels, filter: &Labels) -> bool {
    filter
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}
