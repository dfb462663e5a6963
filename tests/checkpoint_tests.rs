// SPDX-License-Identifier: MIT
// Copyright (c) 2024 Edge Bench Project
//
// Tests for matrix checkpoint persistence

mod common;

use anyhow::Result;
use chrono::Utc;
use common::*;
use edge_bench_rs::checkpoints::{CheckpointLoad, CheckpointStore, MatrixCheckpoint};
use edge_bench_rs::config::ModelCatalog;
use edge_bench_rs::matrix::{Cell, CellStatus};
use edge_bench_rs::prediction::MemorySample;
use edge_bench_rs::termination::{
    DirectiveRule, DirectiveScope, ResultRecord, TerminationDirective,
};
use edge_bench_rs::MatrixError;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;

    fn cells() -> Vec<Cell> {
        let config = test_config(&["interactive"]);
        let catalog = ModelCatalog::new(vec![
            model("small", "1B", &["Q4_K_M", "Q5_K_M"]),
            model("large", "7B", &["Q4_K_M"]),
        ]);
        build_cells(&config, &catalog, &["Q4_K_M", "Q5_K_M"])
    }

    /// Small passed, large skipped by a size directive, small Q5 still pending
    fn create_test_checkpoint(signature: &str) -> MatrixCheckpoint {
        let mut cells = cells();
        cells[0].transition(CellStatus::Running).unwrap();
        cells[0].transition(CellStatus::Passed).unwrap();
        cells[1].transition(CellStatus::SkippedPath).unwrap();
        cells[1].reason = Some("larger models at Q4_K_M will not do better".to_string());

        let directive = TerminationDirective {
            scope: DirectiveScope::LargerAtQuant {
                quant: cells[0].quant.clone(),
                size_above: cells[0].size_class,
            },
            skip_status: CellStatus::SkippedPath,
            reason: "larger models at Q4_K_M will not do better".to_string(),
            rule: DirectiveRule::SizeEscalation,
        };
        let sample = MemorySample {
            size_class: cells[0].size_class,
            quant: cells[0].quant.clone(),
            peak_memory_gb: 1.8,
        };
        let results = vec![
            ResultRecord::skipped(&cells[1], CellStatus::SkippedPath, "larger models"),
        ];

        MatrixCheckpoint::snapshot(
            signature,
            Utc::now(),
            &cells,
            vec![sample],
            vec![directive],
            results,
        )
    }

    #[test]
    fn test_checkpoint_round_trip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path().join("nested/dir/checkpoint.json"));
        let original = create_test_checkpoint("sig-1");

        store.save(&original)?;
        assert!(store.path().exists());

        let CheckpointLoad::Found(loaded) = store.load("sig-1")? else {
            panic!("checkpoint should load for its own signature");
        };
        assert_eq!(loaded.cells, original.cells);
        assert_eq!(loaded.memory_samples, original.memory_samples);
        assert_eq!(loaded.directives, original.directives);
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.created_at, original.created_at);
        assert_eq!(loaded.progress(), (2, 3));
        assert_eq!(loaded.count(CellStatus::Pending), 1);
        Ok(())
    }

    #[test]
    fn test_missing_checkpoint_is_not_found() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path().join("absent.json"));
        assert!(matches!(store.load("sig")?, CheckpointLoad::NotFound));
        assert!(store.read()?.is_none());
        Ok(())
    }

    #[test]
    fn test_signature_mismatch_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        store.save(&create_test_checkpoint("old"))?;

        let load = store.load("new")?;
        assert!(matches!(
            &load,
            CheckpointLoad::Mismatch { expected, found } if expected == "new" && found == "old"
        ));

        let err = load.into_result().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatrixError>(),
            Some(MatrixError::CheckpointMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_corrupt_checkpoint_is_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("checkpoint.json");
        fs::write(&path, "{\"version\": 1, \"cells\": [")?;

        let err = CheckpointStore::new(&path).read().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatrixError>(),
            Some(MatrixError::CheckpointCorrupt(_))
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_version_is_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));
        let mut checkpoint = create_test_checkpoint("sig");
        checkpoint.version = 99;
        store.save(&checkpoint)?;

        let err = store.load("sig").unwrap_err();
        assert!(err.to_string().contains("unsupported version"));
        Ok(())
    }

    #[test]
    fn test_save_replaces_atomically() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path().join("checkpoint.json"));

        store.save(&create_test_checkpoint("sig"))?;
        let mut updated = create_test_checkpoint("sig");
        updated.cells[2].status = CellStatus::Passed;
        store.save(&updated)?;

        // Only the checkpoint itself remains; no temp files left behind
        let entries: Vec<_> = fs::read_dir(temp_dir.path())?.collect::<Result<_, _>>()?;
        assert_eq!(entries.len(), 1);

        let loaded = store.read()?.unwrap();
        assert_eq!(loaded.progress(), (3, 3));
        Ok(())
    }

    #[test]
    fn test_running_cells_are_saved_as_pending() -> Result<()> {
        let mut cells = cells();
        cells[0].transition(CellStatus::Running)?;
        let checkpoint =
            MatrixCheckpoint::snapshot("sig", Utc::now(), &cells, vec![], vec![], vec![]);
        assert!(checkpoint
            .cells
            .iter()
            .all(|c| c.status == CellStatus::Pending));
        Ok(())
    }
}
