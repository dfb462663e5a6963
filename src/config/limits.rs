use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource limits and lifecycle bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Hard ceiling for predicted cell memory, independent of what is free
    pub max_memory_gb: f64,
    pub max_load_time_secs: u64,
    /// Predicted memory is multiplied by this before admission
    pub safety_margin: f64,
    pub shutdown_grace_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_memory_gb: 14.0,
            max_load_time_secs: 300,
            safety_margin: 1.2,
            shutdown_grace_secs: 30,
        }
    }
}

impl LimitsConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.max_load_time_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
