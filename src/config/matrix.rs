use crate::matrix::QuantLevel;
use serde::{Deserialize, Serialize};

fn levels(names: &[&str]) -> Vec<QuantLevel> {
    names.iter().map(|n| QuantLevel::new(*n)).collect()
}

/// Grid shape: which quantizations, in which order, with which workloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub quick_mode_quants: Vec<QuantLevel>,
    pub full_mode_quants: Vec<QuantLevel>,
    /// Traversal order; requested levels missing here follow in request order
    pub quant_priority: Vec<QuantLevel>,
    /// Levels that must all fail before a model's higher levels are pruned
    pub quant_floor: Vec<QuantLevel>,
    pub floor_baseline: QuantLevel,
    pub enabled_workloads: Vec<String>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            quick_mode_quants: levels(&["Q4_K_M", "Q5_K_M"]),
            full_mode_quants: levels(&["Q2_K", "Q3_K_M", "Q4_K_M", "Q5_K_M", "Q6_K", "Q8_0"]),
            quant_priority: crate::matrix::default_priority(),
            quant_floor: levels(&["Q2_K", "Q3_K_M", "Q4_K_M"]),
            floor_baseline: QuantLevel::new("Q4_K_M"),
            enabled_workloads: ["interactive", "long_context", "batch", "quality", "stress"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}
