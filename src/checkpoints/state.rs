//! Checkpoint state container

use crate::error::MatrixError;
use crate::matrix::{Cell, CellStatus, FailureCause, QuantLevel};
use crate::prediction::MemorySample;
use crate::termination::{ResultRecord, TerminationDirective};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const CHECKPOINT_VERSION: u32 = 1;

/// Persisted status of one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    pub model_id: String,
    pub quant: QuantLevel,
    pub status: CellStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub failure_cause: Option<FailureCause>,
}

/// Complete matrix run snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixCheckpoint {
    pub version: u32,
    pub matrix_signature: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cells: Vec<CellState>,
    #[serde(default)]
    pub memory_samples: Vec<MemorySample>,
    #[serde(default)]
    pub directives: Vec<TerminationDirective>,
    #[serde(default)]
    pub results: Vec<ResultRecord>,
}

impl MatrixCheckpoint {
    /// Capture the current run state. In-flight cells are written as pending.
    pub fn snapshot(
        matrix_signature: &str,
        created_at: DateTime<Utc>,
        cells: &[Cell],
        memory_samples: Vec<MemorySample>,
        directives: Vec<TerminationDirective>,
        results: Vec<ResultRecord>,
    ) -> Self {
        let cells = cells
            .iter()
            .map(|cell| {
                let running = cell.status() == CellStatus::Running;
                CellState {
                    model_id: cell.model_id.clone(),
                    quant: cell.quant.clone(),
                    status: if running {
                        CellStatus::Pending
                    } else {
                        cell.status()
                    },
                    reason: if running { None } else { cell.reason.clone() },
                    failure_cause: if running { None } else { cell.failure_cause },
                }
            })
            .collect();

        Self {
            version: CHECKPOINT_VERSION,
            matrix_signature: matrix_signature.to_string(),
            created_at,
            updated_at: Utc::now(),
            cells,
            memory_samples,
            directives,
            results,
        }
    }

    pub fn validate(&self) -> Result<(), MatrixError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(MatrixError::CheckpointCorrupt(format!(
                "unsupported version {} (expected {})",
                self.version, CHECKPOINT_VERSION
            )));
        }

        let mut keys = HashSet::new();
        for cell in &self.cells {
            if !keys.insert((cell.model_id.as_str(), cell.quant.name())) {
                return Err(MatrixError::CheckpointCorrupt(format!(
                    "duplicate cell {} {}",
                    cell.model_id, cell.quant
                )));
            }
        }

        for result in &self.results {
            if !keys.contains(&(result.model_id.as_str(), result.quant.name())) {
                return Err(MatrixError::CheckpointCorrupt(format!(
                    "result for unknown cell {} {}",
                    result.model_id, result.quant
                )));
            }
        }
        Ok(())
    }

    /// (terminal cells, total cells)
    pub fn progress(&self) -> (usize, usize) {
        let done = self.cells.iter().filter(|c| c.status.is_terminal()).count();
        (done, self.cells.len())
    }

    pub fn count(&self, status: CellStatus) -> usize {
        self.cells.iter().filter(|c| c.status == status).count()
    }
}
