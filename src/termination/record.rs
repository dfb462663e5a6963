use crate::matrix::{Cell, CellKey, CellStatus, FailureCause, QuantLevel, SizeClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Terminal state of a single workload run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadStatus {
    Completed,
    /// Stopped early by the workload itself (e.g. thermal limit)
    Aborted,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadResult {
    pub workload_id: String,
    pub status: WorkloadStatus,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub error: Option<String>,
    pub duration_secs: f64,
}

impl WorkloadResult {
    pub fn errored(workload_id: &str, error: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            workload_id: workload_id.to_string(),
            status: WorkloadStatus::Error,
            metrics: BTreeMap::new(),
            error: Some(error.into()),
            duration_secs,
        }
    }
}

/// Overall quality tier of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Failed,
    Error,
    Skipped,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Acceptable => "acceptable",
            Rating::Poor => "poor",
            Rating::Failed => "failed",
            Rating::Error => "error",
            Rating::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Per-cell aggregate of everything measured (or why nothing was)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub model_id: String,
    pub size_class: SizeClass,
    pub quant: QuantLevel,
    pub status: CellStatus,
    pub rating: Rating,
    #[serde(default)]
    pub failure_cause: Option<FailureCause>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub workloads: Vec<WorkloadResult>,
    #[serde(default)]
    pub peak_memory_bytes: Option<u64>,
    pub duration_secs: f64,
    pub started_at: DateTime<Utc>,
}

impl ResultRecord {
    fn bare(cell: &Cell, status: CellStatus, rating: Rating, reason: Option<String>) -> Self {
        Self {
            model_id: cell.model_id.clone(),
            size_class: cell.size_class,
            quant: cell.quant.clone(),
            status,
            rating,
            failure_cause: None,
            reason,
            workloads: Vec::new(),
            peak_memory_bytes: None,
            duration_secs: 0.0,
            started_at: Utc::now(),
        }
    }

    pub fn skipped(cell: &Cell, status: CellStatus, reason: impl Into<String>) -> Self {
        Self::bare(cell, status, Rating::Skipped, Some(reason.into()))
    }

    pub fn errored(cell: &Cell, reason: impl Into<String>) -> Self {
        Self::bare(cell, CellStatus::Error, Rating::Error, Some(reason.into()))
    }

    pub fn load_failed(cell: &Cell, reason: impl Into<String>, duration_secs: f64) -> Self {
        let mut record = Self::bare(cell, CellStatus::Failed, Rating::Failed, Some(reason.into()));
        record.failure_cause = Some(FailureCause::LoadTimeout);
        record.duration_secs = duration_secs;
        record
    }

    pub fn key(&self) -> CellKey {
        CellKey {
            model_id: self.model_id.clone(),
            quant: self.quant.clone(),
        }
    }
}
