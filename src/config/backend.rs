use serde::{Deserialize, Serialize};

/// llama-server process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub server_path: String,
    pub host: String,
    pub ctx_size: usize,
    pub port_start: u16,
    pub port_end: u16,
    pub threads: Option<usize>,
    pub n_gpu_layers: Option<i32>,

    // Readiness polling
    pub poll_interval_secs: u64,
    pub health_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            server_path: "./llama-server".to_string(),
            host: "127.0.0.1".to_string(),
            ctx_size: 8192,
            port_start: 8080,
            port_end: 8180,
            threads: None,
            n_gpu_layers: None,
            poll_interval_secs: 2,
            health_timeout_secs: 2,
        }
    }
}
