// SPDX-License-Identifier: MIT
// Copyright (c) 2024 Edge Bench Project
//
// CheckpointStore persists matrix snapshots atomically and refuses to hand
// back a snapshot written for a different matrix.

use crate::checkpoints::MatrixCheckpoint;
use crate::error::MatrixError;
use anyhow::{Context, Result};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Outcome of reading a checkpoint for a given matrix
#[derive(Debug)]
pub enum CheckpointLoad {
    Found(Box<MatrixCheckpoint>),
    NotFound,
    Mismatch { expected: String, found: String },
}

impl CheckpointLoad {
    /// Treat a signature mismatch as a hard error
    pub fn into_result(self) -> Result<Option<MatrixCheckpoint>> {
        match self {
            CheckpointLoad::Found(cp) => Ok(Some(*cp)),
            CheckpointLoad::NotFound => Ok(None),
            CheckpointLoad::Mismatch { expected, found } => {
                Err(MatrixError::CheckpointMismatch { expected, found }.into())
            }
        }
    }
}

/// Single-file checkpoint store
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to a temp file in the same directory, then rename over the target
    pub fn save(&self, checkpoint: &MatrixCheckpoint) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).with_context(|| {
            format!("Failed to create checkpoint directory {}", dir.display())
        })?;

        let tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, checkpoint)
                .context("Failed to serialize checkpoint")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).with_context(|| {
            format!("Failed to save checkpoint to {}", self.path.display())
        })?;

        tracing::debug!("Checkpoint saved: {}", self.path.display());
        Ok(())
    }

    /// Read whatever is on disk, without signature validation
    pub fn read(&self) -> Result<Option<MatrixCheckpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path).with_context(|| {
            format!("Failed to read checkpoint {}", self.path.display())
        })?;
        let checkpoint: MatrixCheckpoint = serde_json::from_str(&json)
            .map_err(|e| MatrixError::CheckpointCorrupt(e.to_string()))?;
        checkpoint.validate()?;
        Ok(Some(checkpoint))
    }

    pub fn load(&self, matrix_signature: &str) -> Result<CheckpointLoad> {
        let Some(checkpoint) = self.read()? else {
            return Ok(CheckpointLoad::NotFound);
        };

        if checkpoint.matrix_signature != matrix_signature {
            return Ok(CheckpointLoad::Mismatch {
                expected: matrix_signature.to_string(),
                found: checkpoint.matrix_signature,
            });
        }

        let (done, total) = checkpoint.progress();
        tracing::info!(
            "Loaded checkpoint {} ({}/{} cells complete)",
            self.path.display(),
            done,
            total
        );
        Ok(CheckpointLoad::Found(Box::new(checkpoint)))
    }
}
