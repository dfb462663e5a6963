//! Typed errors for matrix scheduling

use crate::matrix::CellStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error(
        "checkpoint was written for a different matrix (expected signature {expected}, found {found}); \
         the model catalog, quantization list or thresholds changed since it was saved"
    )]
    CheckpointMismatch { expected: String, found: String },

    #[error("checkpoint is corrupt: {0}")]
    CheckpointCorrupt(String),

    #[error("invalid configuration for '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    #[error("unrecognised model size class: {0}")]
    UnknownSizeClass(String),

    #[error("model file {file} for {model} not found under {model_dir}")]
    ModelFileMissing {
        model: String,
        file: String,
        model_dir: String,
    },

    #[error("illegal status change for {cell}: {from} -> {to}")]
    InvalidTransition {
        cell: String,
        from: CellStatus,
        to: CellStatus,
    },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("workload '{workload}' failed: {message}")]
    Workload { workload: String, message: String },

    #[error("interrupted by user")]
    Interrupted,
}

impl MatrixError {
    pub fn invalid_config(field: &str, message: impl Into<String>) -> Self {
        MatrixError::InvalidConfig {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
