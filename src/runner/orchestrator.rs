//! Sequential execution of the matrix with pruning and checkpointing

use crate::backend::{Backend, InstanceHandle, Readiness};
use crate::checkpoints::{CheckpointStore, MatrixCheckpoint};
use crate::config::{Config, LimitsConfig, WorkloadsConfig};
use crate::error::MatrixError;
use crate::hardware::{MemoryProbe, BYTES_PER_GB};
use crate::matrix::{Cell, CellKey, CellStatus, FailureCause, SizeClass};
use crate::prediction::{admit, Admission, ResourcePrediction, ResourcePredictor};
use crate::runner::{EventLog, RunSummary};
use crate::shutdown::ShutdownFlag;
use crate::termination::{ResultRecord, TerminationEngine, WorkloadResult};
use crate::utils::ModelLocator;
use crate::workloads::{WorkloadContext, WorkloadRunner};
use anyhow::Result;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use serde_json::json;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Final state handed back to the caller
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: Vec<ResultRecord>,
    pub summary: RunSummary,
    /// True when the run stopped on an interrupt; pending cells remain
    pub interrupted: bool,
}

/// One row of a dry-run plan
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub key: CellKey,
    pub size_class: SizeClass,
    pub status: CellStatus,
    pub prediction: ResourcePrediction,
    pub admission: Admission,
}

enum CellOutcome {
    Done,
    Interrupted,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Drives cells through backend start, workloads, classification and
/// pruning, one at a time.
pub struct MatrixRunner {
    cells: Vec<Cell>,
    signature: String,
    created_at: DateTime<Utc>,
    predictor: ResourcePredictor,
    engine: TerminationEngine,
    limits: LimitsConfig,
    enabled_workloads: Vec<String>,
    workload_timeouts: WorkloadsConfig,
    results: Vec<ResultRecord>,

    backend: Box<dyn Backend>,
    workloads: Box<dyn WorkloadRunner>,
    memory: Box<dyn MemoryProbe>,
    locator: Box<dyn ModelLocator>,

    checkpoint: Option<CheckpointStore>,
    events: Option<EventLog>,
    shutdown: ShutdownFlag,
    progress: ProgressBar,
    active: Option<InstanceHandle>,
}

impl MatrixRunner {
    pub fn new(
        config: &Config,
        cells: Vec<Cell>,
        signature: impl Into<String>,
        backend: Box<dyn Backend>,
        workloads: Box<dyn WorkloadRunner>,
        memory: Box<dyn MemoryProbe>,
        locator: Box<dyn ModelLocator>,
    ) -> Self {
        Self {
            cells,
            signature: signature.into(),
            created_at: Utc::now(),
            predictor: ResourcePredictor::new(config.prediction.clone()),
            engine: TerminationEngine::new(config.thresholds.clone(), &config.matrix),
            limits: config.limits.clone(),
            enabled_workloads: config.matrix.enabled_workloads.clone(),
            workload_timeouts: config.workloads.clone(),
            results: Vec::new(),
            backend,
            workloads,
            memory,
            locator,
            checkpoint: None,
            events: None,
            shutdown: ShutdownFlag::new(),
            progress: ProgressBar::hidden(),
            active: None,
        }
    }

    pub fn with_checkpoint(mut self, store: CheckpointStore) -> Self {
        self.checkpoint = Some(store);
        self
    }

    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.events = Some(log);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn results(&self) -> &[ResultRecord] {
        &self.results
    }

    pub fn predictor(&self) -> &ResourcePredictor {
        &self.predictor
    }

    pub fn engine(&self) -> &TerminationEngine {
        &self.engine
    }

    /// Restore statuses, samples, directives and results from a checkpoint
    pub fn resume(&mut self, checkpoint: MatrixCheckpoint) -> Result<()> {
        if checkpoint.matrix_signature != self.signature {
            return Err(MatrixError::CheckpointMismatch {
                expected: self.signature.clone(),
                found: checkpoint.matrix_signature,
            }
            .into());
        }

        let index: HashMap<CellKey, usize> = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, c)| (c.key(), i))
            .collect();

        for state in checkpoint.cells {
            let key = CellKey {
                model_id: state.model_id,
                quant: state.quant,
            };
            let idx = *index.get(&key).ok_or_else(|| {
                MatrixError::CheckpointCorrupt(format!("cell {} is not part of this matrix", key))
            })?;
            self.cells[idx].restore(state.status, state.reason, state.failure_cause);
        }

        for sample in checkpoint.memory_samples {
            self.predictor
                .record(sample.size_class, sample.quant, sample.peak_memory_gb);
        }
        self.engine.restore(checkpoint.directives);
        self.results = checkpoint.results;
        self.created_at = checkpoint.created_at;

        let done = self.cells.iter().filter(|c| c.status().is_terminal()).count();
        tracing::info!(
            "Resumed matrix: {}/{} cells already complete, {} directives active",
            done,
            self.cells.len(),
            self.engine.directives().len()
        );
        Ok(())
    }

    /// Predictions and admission decisions for every cell. Starts nothing.
    pub fn plan(&mut self) -> Result<Vec<PlanEntry>> {
        let available = self.memory.available_gb()?;
        Ok(self
            .cells
            .iter()
            .map(|cell| {
                let prediction =
                    self.predictor
                        .predict(cell.size_class, &cell.quant, cell.estimated_file_bytes);
                let admission = admit(cell, &prediction, available, &self.limits);
                PlanEntry {
                    key: cell.key(),
                    size_class: cell.size_class,
                    status: cell.status(),
                    prediction,
                    admission,
                }
            })
            .collect())
    }

    pub fn run(&mut self) -> Result<RunOutcome> {
        let total = self.cells.len();
        let already_done = self.cells.iter().filter(|c| c.status().is_terminal()).count();
        self.event(json!({
            "event": "matrix_start",
            "signature": self.signature,
            "cells": total,
            "already_complete": already_done,
            "workloads": self.enabled_workloads,
        }));
        self.progress.set_length(total as u64);
        self.progress.set_position(already_done as u64);

        for idx in 0..total {
            if self.shutdown.is_requested() {
                return Ok(self.interrupt(None));
            }
            if self.cells[idx].status().is_terminal() {
                continue;
            }

            self.progress.set_message(self.cells[idx].key().to_string());

            if let Some(directive) = self.engine.matching(&self.cells[idx]).cloned() {
                if let Err(e) = self.skip(idx, directive.skip_status, directive.reason) {
                    self.fail_with_error(idx, format!("{:#}", e));
                }
            } else {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_cell(idx)));
                match outcome {
                    Ok(Ok(CellOutcome::Done)) => {}
                    Ok(Ok(CellOutcome::Interrupted)) => return Ok(self.interrupt(Some(idx))),
                    Ok(Err(e)) => self.fail_with_error(idx, format!("{:#}", e)),
                    Err(payload) => self.fail_with_error(
                        idx,
                        format!("panic during cell: {}", panic_message(payload.as_ref())),
                    ),
                }
            }

            self.save_checkpoint();
            self.progress.inc(1);
        }

        self.progress.finish_with_message("matrix complete");
        let summary = RunSummary::from_results(&self.results);
        self.event(json!({
            "event": "matrix_complete",
            "summary": summary,
        }));

        Ok(RunOutcome {
            results: self.results.clone(),
            summary,
            interrupted: false,
        })
    }

    fn run_cell(&mut self, idx: usize) -> Result<CellOutcome> {
        let cell = self.cells[idx].clone();

        let available = self.memory.available_gb()?;
        let prediction =
            self.predictor
                .predict(cell.size_class, &cell.quant, cell.estimated_file_bytes);
        if let Admission::Skip(reason) = admit(&cell, &prediction, available, &self.limits) {
            self.skip(idx, CellStatus::SkippedPreflight, reason)?;
            return Ok(CellOutcome::Done);
        }

        // A missing file is an error, not a load failure: no directives follow
        let model_path = self.locator.locate(&cell)?;

        self.cells[idx].transition(CellStatus::Running)?;
        self.event(json!({
            "event": "cell_start",
            "model": cell.model_id,
            "quant": cell.quant,
            "predicted_memory_gb": prediction.memory_gb,
            "confidence": prediction.confidence,
            "available_gb": available,
        }));
        tracing::info!(
            "Running {} {} (predicted {:.1} GB, {})",
            cell.model_id,
            cell.quant,
            prediction.memory_gb,
            prediction.confidence
        );

        let started_at = Utc::now();
        let timer = Instant::now();

        let handle = match self.backend.start(&model_path, &cell.quant) {
            Ok(handle) => handle,
            Err(e) => {
                return self.finish_load_failure(
                    idx,
                    format!("backend failed to start: {:#}", e),
                    timer,
                )
            }
        };
        self.active = Some(handle.clone());

        let load_timeout = self.limits.load_timeout();
        let readiness = self
            .backend
            .wait_ready(&handle, load_timeout, &self.shutdown);
        let failure = match readiness {
            Ok(Readiness::Ready) => None,
            Ok(Readiness::Cancelled) => {
                self.release();
                return Ok(CellOutcome::Interrupted);
            }
            Ok(Readiness::TimedOut) => Some(format!(
                "backend not ready within {}s",
                load_timeout.as_secs()
            )),
            Ok(Readiness::Exited(detail)) => Some(format!("backend exited during load: {}", detail)),
            Err(e) => Some(format!("readiness check failed: {:#}", e)),
        };
        if let Some(reason) = failure {
            self.release();
            return self.finish_load_failure(idx, reason, timer);
        }

        let shutdown = self.shutdown.clone();
        let mut sub_results = Vec::with_capacity(self.enabled_workloads.len());
        let mut peak_bytes = 0u64;

        for workload_id in self.enabled_workloads.clone() {
            let ctx = WorkloadContext {
                model_id: &cell.model_id,
                quant: &cell.quant,
                timeout: self.workload_timeouts.timeout_for(&workload_id),
                shutdown: &shutdown,
            };
            let workload_timer = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.workloads.run(&workload_id, &handle, &ctx)
            }));
            let duration_secs = workload_timer.elapsed().as_secs_f64();

            // Interrupted mid-workload: partial data is discarded
            if shutdown.is_requested() {
                self.release();
                return Ok(CellOutcome::Interrupted);
            }

            let result = match outcome {
                Ok(Ok(o)) => WorkloadResult {
                    workload_id: workload_id.clone(),
                    status: o.status,
                    metrics: o.metrics,
                    error: o.error,
                    duration_secs,
                },
                Ok(Err(e)) => {
                    tracing::warn!("Workload {} failed: {:#}", workload_id, e);
                    WorkloadResult::errored(&workload_id, format!("{:#}", e), duration_secs)
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!("Workload {} panicked: {}", workload_id, message);
                    WorkloadResult::errored(&workload_id, format!("panicked: {}", message), duration_secs)
                }
            };
            sub_results.push(result);

            match self.backend.peak_memory_bytes(&handle) {
                Ok(bytes) => peak_bytes = peak_bytes.max(bytes),
                Err(e) => tracing::debug!("Peak memory unavailable: {:#}", e),
            }
        }

        if sub_results.is_empty() {
            if let Ok(bytes) = self.backend.peak_memory_bytes(&handle) {
                peak_bytes = bytes;
            }
        }

        self.release();

        let classification = self.engine.classify(&sub_results);
        let peak = (peak_bytes > 0).then_some(peak_bytes);
        if let Some(bytes) = peak {
            self.predictor
                .record(cell.size_class, cell.quant.clone(), bytes as f64 / BYTES_PER_GB);
        }

        {
            let c = &mut self.cells[idx];
            c.transition(classification.status)?;
            c.reason = classification.reason.clone();
            c.failure_cause = classification.failure_cause;
        }

        let record = ResultRecord {
            model_id: cell.model_id.clone(),
            size_class: cell.size_class,
            quant: cell.quant.clone(),
            status: classification.status,
            rating: classification.rating,
            failure_cause: classification.failure_cause,
            reason: classification.reason.clone(),
            workloads: sub_results,
            peak_memory_bytes: peak,
            duration_secs: timer.elapsed().as_secs_f64(),
            started_at,
        };
        self.results.push(record);

        self.apply_derived_directives(idx);
        if peak.is_some() {
            self.apply_predicted_directives();
        }

        self.event(json!({
            "event": "cell_complete",
            "model": cell.model_id,
            "quant": cell.quant,
            "status": classification.status,
            "rating": classification.rating,
            "peak_memory_bytes": peak,
            "reason": classification.reason,
        }));
        tracing::info!(
            "{} {} -> {} ({})",
            cell.model_id,
            cell.quant,
            classification.status,
            classification.rating
        );
        Ok(CellOutcome::Done)
    }

    fn finish_load_failure(
        &mut self,
        idx: usize,
        reason: String,
        timer: Instant,
    ) -> Result<CellOutcome> {
        tracing::warn!("{}: {}", self.cells[idx].key(), reason);
        {
            let c = &mut self.cells[idx];
            c.transition(CellStatus::Failed)?;
            c.reason = Some(reason.clone());
            c.failure_cause = Some(FailureCause::LoadTimeout);
        }
        let cell = self.cells[idx].clone();
        self.results.push(ResultRecord::load_failed(
            &cell,
            reason.clone(),
            timer.elapsed().as_secs_f64(),
        ));
        self.apply_derived_directives(idx);
        self.event(json!({
            "event": "cell_complete",
            "model": cell.model_id,
            "quant": cell.quant,
            "status": CellStatus::Failed,
            "failure_cause": FailureCause::LoadTimeout,
            "reason": reason,
        }));
        Ok(CellOutcome::Done)
    }

    fn skip(&mut self, idx: usize, status: CellStatus, reason: String) -> Result<()> {
        let cell = &mut self.cells[idx];
        cell.transition(status)?;
        cell.reason = Some(reason.clone());
        let cell = cell.clone();

        tracing::info!("Skipping {} ({}): {}", cell.key(), status, reason);
        self.results.push(ResultRecord::skipped(&cell, status, reason.clone()));
        self.event(json!({
            "event": "cell_skipped",
            "model": cell.model_id,
            "quant": cell.quant,
            "status": status,
            "reason": reason,
        }));
        Ok(())
    }

    fn fail_with_error(&mut self, idx: usize, reason: String) {
        self.release();
        tracing::error!("{} errored: {}", self.cells[idx].key(), reason);

        let cell = &mut self.cells[idx];
        if !cell.status().is_terminal() && cell.transition(CellStatus::Error).is_ok() {
            cell.reason = Some(reason.clone());
            let cell = cell.clone();
            self.results.push(ResultRecord::errored(&cell, reason.clone()));
        }

        let cell = &self.cells[idx];
        let (model, quant) = (cell.model_id.clone(), cell.quant.clone());
        self.event(json!({
            "event": "cell_error",
            "model": model,
            "quant": quant,
            "error": reason,
        }));
    }

    fn apply_derived_directives(&mut self, idx: usize) {
        let cell = self.cells[idx].clone();
        let derived =
            self.engine
                .derive_directives(&cell, cell.status(), &self.results, &self.cells);
        for directive in derived {
            self.engine.push(directive);
        }
    }

    fn apply_predicted_directives(&mut self) {
        let available = match self.memory.available_gb() {
            Ok(gb) => gb,
            Err(e) => {
                tracing::warn!("Skipping memory re-prediction: {:#}", e);
                return;
            }
        };
        let derived =
            self.engine
                .predicted_directives(&self.cells, &self.predictor, available, &self.limits);
        for directive in derived {
            self.engine.push(directive);
        }
    }

    /// Stop the in-flight instance, if any. Stop failures are logged only.
    fn release(&mut self) {
        if let Some(handle) = self.active.take() {
            if let Err(e) = self.backend.stop(&handle, self.limits.shutdown_grace()) {
                tracing::warn!(
                    "Failed to stop backend instance {} ({:#}); presumed dead",
                    handle.id,
                    e
                );
            }
        }
    }

    fn interrupt(&mut self, in_flight: Option<usize>) -> RunOutcome {
        self.release();
        if let Some(idx) = in_flight {
            self.cells[idx].revert_to_pending();
        }
        self.save_checkpoint();

        let remaining = self.cells.iter().filter(|c| !c.status().is_terminal()).count();
        tracing::warn!("Interrupted with {} cells remaining", remaining);
        self.event(json!({
            "event": "interrupted",
            "remaining": remaining,
        }));
        self.progress.abandon_with_message("interrupted");

        RunOutcome {
            results: self.results.clone(),
            summary: RunSummary::from_results(&self.results),
            interrupted: true,
        }
    }

    fn save_checkpoint(&self) {
        let Some(store) = &self.checkpoint else {
            return;
        };
        let snapshot = MatrixCheckpoint::snapshot(
            &self.signature,
            self.created_at,
            &self.cells,
            self.predictor.samples().cloned().collect(),
            self.engine.directives().to_vec(),
            self.results.clone(),
        );
        if let Err(e) = store.save(&snapshot) {
            tracing::error!("Checkpoint save failed, continuing: {:#}", e);
        }
    }

    fn event(&mut self, value: serde_json::Value) {
        if let Some(log) = self.events.as_mut() {
            if let Err(e) = log.log(value) {
                tracing::warn!("Failed to write event log: {:#}", e);
            }
        }
    }
}

impl Drop for MatrixRunner {
    fn drop(&mut self) {
        self.release();
    }
}
