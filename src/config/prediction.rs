use serde::{Deserialize, Serialize};

/// Resource predictor tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Heuristic used before any sample exists: memory = file size × this
    pub file_size_multiplier: f64,
    /// Upward bias applied to extrapolated predictions (0.10 = +10%)
    pub extrapolation_bias: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            file_size_multiplier: 1.2,
            extrapolation_bias: 0.10,
        }
    }
}
