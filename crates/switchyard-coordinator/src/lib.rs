//! Task coordination engine for pools of autonomous workers.
//!
//! Tasks are created with a priority and a set of dependencies, parked until
//! their dependencies complete, matched to idle workers by a capability × load
//! score, and dispatched to the worker's async entry point. Every lifecycle
//! step is recorded through a shared [`MonitoringSystem`].
//!
//! # Main types
//!
//! - [`Coordinator`] — Façade owning the task table, lanes, dependency graph and registry.
//! - [`Worker`] — Contract every registered agent implements.
//! - [`Task`] — Schedulable unit of work with its lifecycle state.
//! - [`TaskQueue`] — Four FIFO priority lanes of pending task ids.
//! - [`DependencyGraph`] — Which tasks wait on which.
//! - [`AgentRegistry`] — Registered workers, capabilities and load counters.
//!
//! [`MonitoringSystem`]: switchyard_monitor::MonitoringSystem

/// Coordinator configuration.
pub mod config;
/// The coordinator façade.
pub mod coordinator;
/// Waiter bookkeeping for task dependencies.
pub mod dependency;
/// Dispatch of assigned tasks to workers.
pub mod executor;
/// Registered workers and their load counters.
pub mod registry;
/// Task-to-agent matching.
pub mod scheduler;
/// Capability and load scoring.
pub mod scoring;
mod state;
/// Priority lanes.
pub mod task_queue;
/// Shared coordination types (Task, TaskStatus, AgentCapability, etc.).
pub mod types;
/// The worker contract.
pub mod worker;

pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use dependency::DependencyGraph;
pub use executor::parse_worker_output;
pub use registry::{AgentRegistry, RegisteredAgent};
pub use task_queue::TaskQueue;
pub use types::{
    AgentCapability, AgentStatus, CoordinatorSummary, ProcessReport, Task, TaskEnvelope, TaskId,
    TaskOutcome, TaskPriority, TaskStatus, TaskSummary, WorkerState,
};
pub use worker::Worker;
