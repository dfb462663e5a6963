use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub model_dir: String,
    pub models_config: String,
    pub output_dir: String,
    pub checkpoint_path: Option<String>,
    pub event_log: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            model_dir: "models".to_string(),
            models_config: "config/models.json".to_string(),
            output_dir: "results".to_string(),
            checkpoint_path: None,
            event_log: "matrix_events.jsonl".to_string(),
        }
    }
}

impl PathConfig {
    pub fn checkpoint_file(&self) -> PathBuf {
        match &self.checkpoint_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.output_dir).join("checkpoint.json"),
        }
    }

    pub fn event_log_file(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join(&self.event_log)
    }

    pub fn results_file(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join("results.json")
    }
}
