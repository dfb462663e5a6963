use crate::config::LimitsConfig;
use crate::matrix::Cell;
use crate::prediction::ResourcePrediction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Admission {
    Allow,
    Skip(String),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allow)
    }
}

/// Decide whether a cell may run. Pure: no memory is read here.
pub fn admit(
    cell: &Cell,
    prediction: &ResourcePrediction,
    available_gb: f64,
    limits: &LimitsConfig,
) -> Admission {
    let required = prediction.memory_gb * limits.safety_margin;

    if required > available_gb {
        return Admission::Skip(format!(
            "insufficient memory: {} {} needs {:.1} GB ({} prediction × {:.2} margin), {:.1} GB available",
            cell.model_id,
            cell.quant,
            required,
            prediction.confidence,
            limits.safety_margin,
            available_gb
        ));
    }

    if required > limits.max_memory_gb {
        return Admission::Skip(format!(
            "exceeds configured limit: {} {} needs {:.1} GB, limit is {:.1} GB",
            cell.model_id, cell.quant, required, limits.max_memory_gb
        ));
    }

    Admission::Allow
}
