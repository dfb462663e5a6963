use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Direction a metric has to satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// `min_<metric>`: value must be >= threshold
    AtLeast,
    /// `max_<metric>`: value must be <= threshold
    AtMost,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricBound {
    pub metric: String,
    pub kind: BoundKind,
    pub threshold: f64,
    pub critical: bool,
}

impl MetricBound {
    pub fn is_met(&self, value: f64) -> bool {
        match self.kind {
            BoundKind::AtLeast => value >= self.threshold,
            BoundKind::AtMost => value <= self.threshold,
        }
    }
}

/// Thresholds for one workload, keyed like `min_tokens_per_sec`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadThresholds {
    /// Metrics whose violation fails the whole cell
    #[serde(default)]
    pub critical: Vec<String>,
    /// Remaining keys; non-numeric and unprefixed entries are ignored
    #[serde(flatten)]
    pub limits: BTreeMap<String, Value>,
}

impl WorkloadThresholds {
    pub fn bounds(&self) -> Vec<MetricBound> {
        self.limits
            .iter()
            .filter_map(|(key, value)| {
                let threshold = value.as_f64()?;
                let (kind, metric) = if let Some(m) = key.strip_prefix("min_") {
                    (BoundKind::AtLeast, m)
                } else if let Some(m) = key.strip_prefix("max_") {
                    (BoundKind::AtMost, m)
                } else {
                    return None;
                };
                Some(MetricBound {
                    metric: metric.to_string(),
                    kind,
                    threshold,
                    critical: self.critical.iter().any(|c| c == metric),
                })
            })
            .collect()
    }
}

/// Per-workload thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdsConfig {
    pub workloads: BTreeMap<String, WorkloadThresholds>,
}

impl ThresholdsConfig {
    pub fn for_workload(&self, workload: &str) -> Option<&WorkloadThresholds> {
        self.workloads.get(workload)
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        let defaults = json!({
            "interactive": {
                "min_tokens_per_sec": 2,
                "max_time_to_first_token": 30,
                "max_variance": 20,
                "critical": ["tokens_per_sec", "time_to_first_token"]
            },
            "long_context": {
                "max_initial_load_time": 60,
                "test_sizes": [4096, 8192, 16384, 32768],
                "critical": ["initial_load_time"]
            },
            "batch": {
                "max_variance": 20,
                "num_documents": 30
            },
            "quality": {
                "min_math_score": 80,
                "min_comprehension_score": 75,
                "min_reasoning_score": 75,
                "min_format_compliance": 90
            },
            "stress": {
                "max_temperature": 85,
                "duration": 30,
                "sample_interval": 30
            }
        });

        let workloads = match serde_json::from_value(defaults) {
            Ok(w) => w,
            Err(_) => BTreeMap::new(),
        };
        Self { workloads }
    }
}
