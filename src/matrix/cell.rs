//! Grid cells: one (model, quantization level) pairing under test

use crate::error::MatrixError;
use crate::matrix::QuantLevel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parameter-count tier, stored in millions so it stays totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SizeClass {
    params_millions: u64,
}

impl SizeClass {
    pub fn from_millions(params_millions: u64) -> Self {
        Self { params_millions }
    }

    pub fn from_billions(params_billions: f64) -> Self {
        Self {
            params_millions: (params_billions * 1000.0).round() as u64,
        }
    }

    pub fn params_billions(&self) -> f64 {
        self.params_millions as f64 / 1000.0
    }
}

impl FromStr for SizeClass {
    type Err = MatrixError;

    /// Parses `7B`, `1.5B`, `500M` (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_uppercase();
        let (number, scale) = if let Some(n) = trimmed.strip_suffix('B') {
            (n, 1000.0)
        } else if let Some(n) = trimmed.strip_suffix('M') {
            (n, 1.0)
        } else {
            return Err(MatrixError::UnknownSizeClass(s.to_string()));
        };

        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| MatrixError::UnknownSizeClass(s.to_string()))?;
        if value.is_nan() || value <= 0.0 {
            return Err(MatrixError::UnknownSizeClass(s.to_string()));
        }

        Ok(Self {
            params_millions: (value * scale).round() as u64,
        })
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params_millions >= 1000 {
            let billions = self.params_billions();
            if self.params_millions % 1000 == 0 {
                write!(f, "{}B", self.params_millions / 1000)
            } else {
                write!(f, "{}B", billions)
            }
        } else {
            write!(f, "{}M", self.params_millions)
        }
    }
}

impl TryFrom<String> for SizeClass {
    type Error = MatrixError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SizeClass> for String {
    fn from(size: SizeClass) -> Self {
        size.to_string()
    }
}

/// Lifecycle status of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Pending,
    SkippedPreflight,
    SkippedPredicted,
    SkippedPath,
    Running,
    Passed,
    Partial,
    Failed,
    Error,
}

impl CellStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CellStatus::Pending | CellStatus::Running)
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            CellStatus::SkippedPreflight | CellStatus::SkippedPredicted | CellStatus::SkippedPath
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CellStatus::Pending => "pending",
            CellStatus::SkippedPreflight => "skipped_preflight",
            CellStatus::SkippedPredicted => "skipped_predicted",
            CellStatus::SkippedPath => "skipped_path",
            CellStatus::Running => "running",
            CellStatus::Passed => "passed",
            CellStatus::Partial => "partial",
            CellStatus::Failed => "failed",
            CellStatus::Error => "error",
        }
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a cell ended up `failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Backend never became ready (start error, early exit, or load timeout)
    LoadTimeout,
    /// A critical metric fell below its threshold
    Performance,
}

/// Identity of a cell within a matrix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub model_id: String,
    pub quant: QuantLevel,
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.model_id, self.quant)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub model_id: String,
    pub size_class: SizeClass,
    pub quant: QuantLevel,
    /// Catalog filename for this quantization
    pub file_name: String,
    pub estimated_file_bytes: u64,
    status: CellStatus,
    /// Justification for skip/error statuses
    pub reason: Option<String>,
    pub failure_cause: Option<FailureCause>,
}

impl Cell {
    pub fn new(
        model_id: impl Into<String>,
        size_class: SizeClass,
        quant: QuantLevel,
        file_name: impl Into<String>,
        estimated_file_bytes: u64,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            size_class,
            quant,
            file_name: file_name.into(),
            estimated_file_bytes,
            status: CellStatus::Pending,
            reason: None,
            failure_cause: None,
        }
    }

    pub fn key(&self) -> CellKey {
        CellKey {
            model_id: self.model_id.clone(),
            quant: self.quant.clone(),
        }
    }

    pub fn status(&self) -> CellStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == CellStatus::Pending
    }

    /// Move to a new status. Terminal statuses are never re-opened.
    pub fn transition(&mut self, to: CellStatus) -> Result<(), MatrixError> {
        let allowed = match (self.status, to) {
            (CellStatus::Pending, CellStatus::Running)
            | (CellStatus::Pending, CellStatus::Error) => true,
            (CellStatus::Pending, skip) if skip.is_skip() => true,
            (CellStatus::Running, CellStatus::Passed)
            | (CellStatus::Running, CellStatus::Partial)
            | (CellStatus::Running, CellStatus::Failed)
            | (CellStatus::Running, CellStatus::Error) => true,
            _ => false,
        };

        if !allowed {
            return Err(MatrixError::InvalidTransition {
                cell: self.key().to_string(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Put an interrupted in-flight cell back to `pending` for a future resume
    pub fn revert_to_pending(&mut self) {
        if self.status == CellStatus::Running {
            self.status = CellStatus::Pending;
        }
    }

    /// Restore a persisted status without transition checks (resume only).
    /// `running` is never trusted from disk and comes back as `pending`.
    pub(crate) fn restore(
        &mut self,
        status: CellStatus,
        reason: Option<String>,
        cause: Option<FailureCause>,
    ) {
        self.status = if status == CellStatus::Running {
            CellStatus::Pending
        } else {
            status
        };
        self.reason = reason;
        self.failure_cause = cause;
    }
}
