//! Capability × load scoring used by the scheduler.
//!
//! The keyword match is a heuristic. What matters is the ordering it
//! produces: a higher declared score, a better keyword overlap or a lower
//! load never makes an agent less likely to be picked.

use crate::types::{AgentCapability, Task};
use std::collections::HashSet;

/// Lowercase alphanumeric runs of `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Keywords of a task: its name and description tokens.
pub fn task_keywords(task: &Task) -> HashSet<String> {
    let mut keywords = tokenize(&task.name);
    keywords.extend(tokenize(&task.description));
    keywords
}

/// How well one capability matches a task's keywords, in `[0, 1]`.
///
/// The capability name is its declared keyword set, so any name token found
/// in the task counts proportionally to the name; description tokens count
/// proportionally to the task's keyword set. The better of the two wins.
pub fn capability_relevance(keywords: &HashSet<String>, capability: &AgentCapability) -> f64 {
    let name_tokens = tokenize(&capability.name);
    let name_coverage = if name_tokens.is_empty() {
        0.0
    } else {
        name_tokens.intersection(keywords).count() as f64 / name_tokens.len() as f64
    };

    let description_tokens = tokenize(&capability.description);
    let description_overlap =
        description_tokens.intersection(keywords).count() as f64 / keywords.len().max(1) as f64;

    name_coverage.max(description_overlap)
}

/// Best `relevance × declared score` over the agent's capabilities.
///
/// An agent declaring no capabilities gets `default_score`.
pub fn capability_score(task: &Task, capabilities: &[AgentCapability], default_score: f64) -> f64 {
    if capabilities.is_empty() {
        return default_score;
    }
    let keywords = task_keywords(task);
    capabilities
        .iter()
        .map(|cap| capability_relevance(&keywords, cap) * cap.score)
        .fold(0.0, f64::max)
}

/// `max(min_score, 1 - load / max_load)`.
pub fn load_score(load: u32, max_load: u32, min_score: f64) -> f64 {
    let ratio = f64::from(load) / f64::from(max_load.max(1));
    (1.0 - ratio).max(min_score)
}
