//! Agent-local threshold configuration.

use std::path::Path;

use serde::Deserialize;

use crate::error::{AgentError, AgentResult};

/// Metric thresholds loaded from a JSON document at startup, e.g.
/// `{"cpu_usage": 50, "ram_usage": 80}`. Unrecognised keys are ignored; an
/// absent limit disables alerting for that metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Thresholds {
    /// CPU usage ceiling, percent.
    pub cpu_usage: Option<f64>,
    /// RAM usage ceiling, percent.
    pub ram_usage: Option<f64>,
}

/// Loads the threshold file. A missing file is fatal to agent startup.
pub fn load(path: &Path) -> AgentResult<Thresholds> {
    let data = std::fs::read_to_string(path)
        .map_err(|_| AgentError::ConfigMissing(path.to_path_buf()))?;
    serde_json::from_str(&data).map_err(AgentError::ConfigInvalid)
}
