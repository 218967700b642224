use crate::types::{AgentCapability, AgentStatus, WorkerState};
use crate::worker::Worker;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Coordinator-side bookkeeping for one registered worker.
pub struct RegisteredAgent {
    pub name: String,
    pub worker: Arc<dyn Worker>,
    pub capabilities: Vec<AgentCapability>,
    pub load: u32,
    /// Last state observed by the coordinator while dispatching.
    pub activity: WorkerState,
    pub registered_at: DateTime<Utc>,
}

impl RegisteredAgent {
    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            name: self.name.clone(),
            state: self.worker.state(),
            activity: self.activity,
            current_load: self.load,
            capabilities: self.capabilities.iter().map(|c| c.name.clone()).collect(),
            registered_at: self.registered_at,
        }
    }
}

/// Registered workers in registration order.
///
/// Iteration order is the tie-breaker for equally scored agents, so the
/// registry is a vector rather than a hash map.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<RegisteredAgent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `worker` under its name with load 0.
    ///
    /// Re-registering a name replaces the entry in place, keeping its
    /// registration position. Returns `true` if an entry was replaced.
    pub fn register(&mut self, worker: Arc<dyn Worker>, capabilities: Vec<AgentCapability>) -> bool {
        let entry = RegisteredAgent {
            name: worker.name().to_string(),
            worker,
            capabilities,
            load: 0,
            activity: WorkerState::Idle,
            registered_at: Utc::now(),
        };
        match self.agents.iter_mut().find(|a| a.name == entry.name) {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.agents.push(entry);
                false
            }
        }
    }

    pub fn unregister(&mut self, name: &str) -> Option<RegisteredAgent> {
        let pos = self.agents.iter().position(|a| a.name == name)?;
        Some(self.agents.remove(pos))
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredAgent> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RegisteredAgent> {
        self.agents.iter_mut().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn add_capability(&mut self, name: &str, capability: AgentCapability) -> bool {
        match self.get_mut(name) {
            Some(agent) => {
                agent.capabilities.push(capability);
                true
            }
            None => false,
        }
    }

    pub fn increment_load(&mut self, name: &str) {
        if let Some(agent) = self.get_mut(name) {
            agent.load += 1;
        }
    }

    /// Decrement the load counter, never below zero. Unknown names are ignored.
    pub fn decrement_load(&mut self, name: &str) {
        if let Some(agent) = self.get_mut(name) {
            agent.load = agent.load.saturating_sub(1);
        }
    }

    pub fn load(&self, name: &str) -> Option<u32> {
        self.get(name).map(|a| a.load)
    }

    pub fn set_activity(&mut self, name: &str, activity: WorkerState) {
        if let Some(agent) = self.get_mut(name) {
            agent.activity = activity;
        }
    }

    /// Agents in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredAgent> {
        self.agents.iter()
    }

    /// Agents whose worker currently reports idle, in registration order.
    pub fn idle(&self) -> impl Iterator<Item = &RegisteredAgent> {
        self.agents
            .iter()
            .filter(|a| a.worker.state() == WorkerState::Idle)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
