pub mod backend;
pub mod limits;
pub mod matrix;
pub mod model;
pub mod paths;
pub mod prediction;
pub mod thresholds;
pub mod workloads;

use crate::error::MatrixError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use backend::BackendConfig;
pub use limits::LimitsConfig;
pub use matrix::MatrixConfig;
pub use model::{ModelCatalog, ModelDefinition};
pub use paths::PathConfig;
pub use prediction::PredictionConfig;
pub use thresholds::{BoundKind, MetricBound, ThresholdsConfig, WorkloadThresholds};
pub use workloads::{WorkloadCommand, WorkloadsConfig};

/// Main configuration for a matrix run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub limits: LimitsConfig,
    pub prediction: PredictionConfig,
    pub matrix: MatrixConfig,
    pub paths: PathConfig,
    pub workloads: WorkloadsConfig,
    pub thresholds: ThresholdsConfig,
}

impl Config {
    /// Load from a JSON file, falling back to defaults when it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MatrixError> {
        let b = &self.backend;
        if !(512..=128_000).contains(&b.ctx_size) {
            return Err(MatrixError::invalid_config(
                "backend.ctx_size",
                format!("{} outside 512..=128000", b.ctx_size),
            ));
        }
        if let Some(threads) = b.threads {
            if !(1..=256).contains(&threads) {
                return Err(MatrixError::invalid_config(
                    "backend.threads",
                    format!("{} outside 1..=256", threads),
                ));
            }
        }
        if b.port_start < 1024 || b.port_start > b.port_end {
            return Err(MatrixError::invalid_config(
                "backend.port_start",
                format!("invalid port range {}..={}", b.port_start, b.port_end),
            ));
        }

        let l = &self.limits;
        if !(1.0..=1024.0).contains(&l.max_memory_gb) {
            return Err(MatrixError::invalid_config(
                "limits.max_memory_gb",
                format!("{} outside 1..=1024", l.max_memory_gb),
            ));
        }
        if l.safety_margin.is_nan() || l.safety_margin < 1.0 {
            return Err(MatrixError::invalid_config(
                "limits.safety_margin",
                "must be at least 1.0",
            ));
        }
        if l.max_load_time_secs == 0 {
            return Err(MatrixError::invalid_config(
                "limits.max_load_time_secs",
                "must be positive",
            ));
        }

        let p = &self.prediction;
        if p.file_size_multiplier.is_nan() || p.file_size_multiplier <= 0.0 {
            return Err(MatrixError::invalid_config(
                "prediction.file_size_multiplier",
                "must be positive",
            ));
        }
        if p.extrapolation_bias.is_nan() || p.extrapolation_bias < 0.0 {
            return Err(MatrixError::invalid_config(
                "prediction.extrapolation_bias",
                "must not be negative",
            ));
        }

        for (name, command) in &self.workloads.commands {
            if command.command.is_empty() {
                return Err(MatrixError::invalid_config(
                    "workloads.commands",
                    format!("empty command for {}", name),
                ));
            }
        }
        Ok(())
    }

    /// Every enabled workload needs a command to run.
    ///
    /// Checked once the workload set is final, since command-line filters
    /// may drop workloads the file leaves unconfigured.
    pub fn check_workload_commands(&self) -> Result<(), MatrixError> {
        let missing: Vec<&str> = self
            .matrix
            .enabled_workloads
            .iter()
            .filter(|w| !self.workloads.commands.contains_key(w.as_str()))
            .map(|w| w.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(MatrixError::invalid_config(
                "workloads.commands",
                format!("no command configured for {}", missing.join(", ")),
            ));
        }
        Ok(())
    }
}
