use crate::types::{TaskEnvelope, WorkerState};
use async_trait::async_trait;
use switchyard_core::SwitchyardResult;

/// Contract for agents registered with a [`Coordinator`](crate::Coordinator).
///
/// The coordinator only reads the coarse [`WorkerState`] signal and awaits
/// [`Worker::process`]; what the worker does with the envelope (model calls,
/// tool execution, domain logic) is its own business.
///
/// To plug in a new agent:
/// 1. Implement `Worker` for your struct
/// 2. Wrap it in an `Arc` and pass it to `Coordinator::register_agent`
///    together with its declared capabilities
#[async_trait]
pub trait Worker: Send + Sync {
    /// Registry key. Must be stable for the lifetime of the registration.
    fn name(&self) -> &str;

    /// Only idle workers are considered by the scheduler.
    fn state(&self) -> WorkerState {
        WorkerState::Idle
    }

    /// Process one task. The returned text is parsed as JSON when possible.
    async fn process(&self, envelope: TaskEnvelope) -> SwitchyardResult<String>;
}
