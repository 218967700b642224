//! Loading of `switchyard.toml`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use switchyard_coordinator::CoordinatorConfig;
use switchyard_core::{SwitchyardError, SwitchyardResult};
use switchyard_monitor::MonitoringConfig;

/// Top-level configuration file. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchyardConfig {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl SwitchyardConfig {
    pub fn validate(&self) -> SwitchyardResult<()> {
        self.coordinator.validate()?;
        self.monitoring.validate()
    }

    /// Render as TOML, the same format [`load_config`] reads.
    pub fn to_toml(&self) -> SwitchyardResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SwitchyardError::Config(format!("Failed to render config: {e}")))
    }
}

/// Read and parse a TOML config file.
///
/// A missing file yields the defaults; an unreadable or unparsable one is an error.
pub fn load_config(path: &Path) -> SwitchyardResult<SwitchyardConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
        return Ok(SwitchyardConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        SwitchyardError::Config(format!(
            "Failed to read config '{}': {}",
            path.display(),
            e
        ))
    })?;
    let config: SwitchyardConfig = toml::from_str(&content).map_err(|e| {
        SwitchyardError::Config(format!(
            "Failed to parse config '{}': {}",
            path.display(),
            e
        ))
    })?;
    config.validate()?;
    Ok(config)
}
