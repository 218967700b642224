use serde::{Deserialize, Serialize};
use switchyard_core::{SwitchyardError, SwitchyardResult};

/// Scheduling constants for a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Used as the event source (`coordinator:<name>`).
    #[serde(default = "default_name")]
    pub name: String,
    /// Load at which an agent's load score bottoms out.
    #[serde(default = "default_max_load")]
    pub max_load: u32,
    /// Floor for the load score, so a busy agent is never fully excluded.
    #[serde(default = "default_min_load_score")]
    pub min_load_score: f64,
    /// Capability score of an agent that declares no capabilities.
    #[serde(default = "default_capability_score")]
    pub default_capability_score: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_load: default_max_load(),
            min_load_score: default_min_load_score(),
            default_capability_score: default_capability_score(),
        }
    }
}

impl CoordinatorConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> SwitchyardResult<()> {
        if self.name.trim().is_empty() {
            return Err(SwitchyardError::Config("coordinator name must not be empty".into()));
        }
        if self.max_load == 0 {
            return Err(SwitchyardError::Config("max_load must be > 0".into()));
        }
        if !(self.min_load_score > 0.0 && self.min_load_score <= 1.0) {
            return Err(SwitchyardError::Config(format!(
                "min_load_score must be in (0, 1], got {}",
                self.min_load_score
            )));
        }
        if !(0.0..=1.0).contains(&self.default_capability_score) {
            return Err(SwitchyardError::Config(format!(
                "default_capability_score must be in [0, 1], got {}",
                self.default_capability_score
            )));
        }
        Ok(())
    }
}

fn default_name() -> String {
    "main".to_string()
}
fn default_max_load() -> u32 {
    5
}
fn default_min_load_score() -> f64 {
    0.1
}
fn default_capability_score() -> f64 {
    0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.name, "main");
        assert_eq!(config.max_load, 5);
        assert_eq!(config.min_load_score, 0.1);
        assert_eq!(config.default_capability_score, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_with_defaults() {
        let config: CoordinatorConfig = toml::from_str(r#"name = "clinic""#).unwrap();
        assert_eq!(config.name, "clinic");
        assert_eq!(config.max_load, 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_load = CoordinatorConfig {
            max_load: 0,
            ..Default::default()
        };
        assert!(zero_load.validate().is_err());

        let no_floor = CoordinatorConfig {
            min_load_score: 0.0,
            ..Default::default()
        };
        assert!(no_floor.validate().is_err());

        let bad_default = CoordinatorConfig {
            default_capability_score: 1.5,
            ..Default::default()
        };
        assert!(matches!(bad_default.validate(), Err(SwitchyardError::Config(_))));
    }
}
