use std::time::Duration;

use serde::Deserialize;

/// Orchestrator behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudioConfig {
    /// Cadence of synthesized progress updates
    #[serde(default = "default_progress_interval", deserialize_with = "crate::duration::deserialize")]
    pub progress_interval: Duration,
    /// How long completion waits for persistence before moving on
    #[serde(default = "default_persistence_grace", deserialize_with = "crate::duration::deserialize")]
    pub persistence_grace: Duration,
    /// Whether persisted generations are public
    #[serde(default)]
    pub public_by_default: bool,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            progress_interval: default_progress_interval(),
            persistence_grace: default_persistence_grace(),
            public_by_default: false,
        }
    }
}

/// Per-session generation quota
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Generations allowed before submissions are refused
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_generations: default_max_generations(),
        }
    }
}

const fn default_progress_interval() -> Duration {
    Duration::from_millis(400)
}

const fn default_persistence_grace() -> Duration {
    Duration::from_millis(1500)
}

const fn default_max_generations() -> u32 {
    50
}
