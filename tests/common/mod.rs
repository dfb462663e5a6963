//! Scripted stand-ins for the backend, workloads, memory and model files

#![allow(dead_code)]

use anyhow::{bail, Result};
use edge_bench_rs::backend::{Backend, InstanceHandle, Readiness};
use edge_bench_rs::config::{Config, ModelCatalog, ModelDefinition};
use edge_bench_rs::hardware::{MemoryProbe, BYTES_PER_GB};
use edge_bench_rs::matrix::{Cell, MatrixBuilder, QuantLevel};
use edge_bench_rs::runner::MatrixRunner;
use edge_bench_rs::shutdown::ShutdownFlag;
use edge_bench_rs::utils::ModelLocator;
use edge_bench_rs::workloads::{WorkloadContext, WorkloadOutcome, WorkloadRunner};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

/// Catalog entry whose files are named `<name>-<quant>.gguf`
pub fn model(name: &str, size: &str, quants: &[&str]) -> ModelDefinition {
    ModelDefinition {
        name: name.to_string(),
        size: Some(size.to_string()),
        repo: None,
        files: quants
            .iter()
            .map(|q| (q.to_string(), file_name(name, q)))
            .collect(),
        file_sizes: BTreeMap::new(),
    }
}

pub fn file_name(model: &str, quant: &str) -> String {
    format!("{}-{}.gguf", model, quant)
}

/// One critical workload (`interactive`) and one soft one (`batch`)
pub fn test_config(workloads: &[&str]) -> Config {
    let mut config = Config::default();
    config.matrix.enabled_workloads = workloads.iter().map(|w| w.to_string()).collect();
    config.thresholds = serde_json::from_value(serde_json::json!({
        "interactive": {
            "min_tokens_per_sec": 2,
            "critical": ["tokens_per_sec"]
        },
        "batch": {
            "max_variance": 20
        }
    }))
    .unwrap();
    config.limits.max_memory_gb = 64.0;
    config
}

pub fn build_cells(config: &Config, catalog: &ModelCatalog, quants: &[&str]) -> Vec<Cell> {
    let quants: Vec<QuantLevel> = quants.iter().map(|q| QuantLevel::new(*q)).collect();
    MatrixBuilder::new(config.matrix.quant_priority.clone())
        .build(catalog, &quants)
        .unwrap()
}

#[derive(Debug, Default)]
pub struct BackendLog {
    pub started: Vec<String>,
    pub stopped: Vec<u64>,
    pub running: HashSet<u64>,
}

/// Backend whose readiness and memory are scripted per model file
#[derive(Default)]
pub struct ScriptedBackend {
    pub log: Rc<RefCell<BackendLog>>,
    readiness: HashMap<String, Readiness>,
    start_errors: HashSet<String>,
    stop_errors: HashSet<String>,
    ready_panics: HashSet<String>,
    peak_gb: HashMap<String, f64>,
    files: HashMap<u64, String>,
    next_id: u64,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readiness(mut self, file: &str, readiness: Readiness) -> Self {
        self.readiness.insert(file.to_string(), readiness);
        self
    }

    pub fn with_start_error(mut self, file: &str) -> Self {
        self.start_errors.insert(file.to_string());
        self
    }

    /// `stop` reports failure and leaves the instance marked running
    pub fn with_stop_error(mut self, file: &str) -> Self {
        self.stop_errors.insert(file.to_string());
        self
    }

    /// `wait_ready` panics after the instance has started
    pub fn with_ready_panic(mut self, file: &str) -> Self {
        self.ready_panics.insert(file.to_string());
        self
    }

    pub fn with_peak_gb(mut self, file: &str, gb: f64) -> Self {
        self.peak_gb.insert(file.to_string(), gb);
        self
    }
}

impl Backend for ScriptedBackend {
    fn start(&mut self, model_path: &Path, _quant: &QuantLevel) -> Result<InstanceHandle> {
        let file = model_path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.start_errors.contains(&file) {
            bail!("no such binary");
        }

        self.next_id += 1;
        let id = self.next_id;
        self.files.insert(id, file.clone());
        let mut log = self.log.borrow_mut();
        log.started.push(file);
        log.running.insert(id);
        Ok(InstanceHandle {
            id,
            url: format!("http://127.0.0.1:{}", 8080 + id),
            pid: None,
        })
    }

    fn wait_ready(
        &mut self,
        handle: &InstanceHandle,
        _timeout: Duration,
        _shutdown: &ShutdownFlag,
    ) -> Result<Readiness> {
        let file = &self.files[&handle.id];
        if self.ready_panics.contains(file) {
            panic!("health check blew up");
        }
        Ok(self
            .readiness
            .get(file)
            .cloned()
            .unwrap_or(Readiness::Ready))
    }

    fn stop(&mut self, handle: &InstanceHandle, _grace: Duration) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.stopped.push(handle.id);
        if self.stop_errors.contains(&self.files[&handle.id]) {
            bail!("kill failed: operation not permitted");
        }
        log.running.remove(&handle.id);
        Ok(())
    }

    fn peak_memory_bytes(&mut self, handle: &InstanceHandle) -> Result<u64> {
        let file = &self.files[&handle.id];
        let gb = self.peak_gb.get(file).copied().unwrap_or(2.0);
        Ok((gb * BYTES_PER_GB) as u64)
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    TokensPerSec(f64),
    Fail(String),
    Panic,
    /// Complete normally, then raise the interrupt flag
    Interrupt,
}

/// Workload runner scripted per (model, workload)
#[derive(Default)]
pub struct ScriptedWorkloads {
    behaviors: HashMap<(String, String), Behavior>,
    model_behaviors: HashMap<String, Behavior>,
    shutdown: Option<ShutdownFlag>,
    pub calls: Rc<RefCell<Vec<(String, String, String)>>>,
}

impl ScriptedWorkloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_model(mut self, model: &str, behavior: Behavior) -> Self {
        self.model_behaviors.insert(model.to_string(), behavior);
        self
    }

    pub fn for_workload(mut self, model: &str, workload: &str, behavior: Behavior) -> Self {
        self.behaviors
            .insert((model.to_string(), workload.to_string()), behavior);
        self
    }

    pub fn with_shutdown(mut self, flag: ShutdownFlag) -> Self {
        self.shutdown = Some(flag);
        self
    }
}

impl WorkloadRunner for ScriptedWorkloads {
    fn run(
        &mut self,
        workload_id: &str,
        _instance: &InstanceHandle,
        ctx: &WorkloadContext<'_>,
    ) -> Result<WorkloadOutcome> {
        self.calls.borrow_mut().push((
            ctx.model_id.to_string(),
            ctx.quant.to_string(),
            workload_id.to_string(),
        ));

        let behavior = self
            .behaviors
            .get(&(ctx.model_id.to_string(), workload_id.to_string()))
            .or_else(|| self.model_behaviors.get(ctx.model_id))
            .cloned()
            .unwrap_or(Behavior::TokensPerSec(10.0));

        let tokens = match behavior {
            Behavior::TokensPerSec(tps) => tps,
            Behavior::Fail(message) => bail!(message),
            Behavior::Panic => panic!("workload blew up"),
            Behavior::Interrupt => {
                if let Some(flag) = &self.shutdown {
                    flag.request();
                }
                10.0
            }
        };

        let metrics = BTreeMap::from([
            ("tokens_per_sec".to_string(), tokens),
            ("variance".to_string(), 5.0),
        ]);
        Ok(WorkloadOutcome::completed(metrics))
    }
}

pub struct FixedMemory(pub f64);

impl MemoryProbe for FixedMemory {
    fn available_gb(&mut self) -> Result<f64> {
        Ok(self.0)
    }
}

/// Every file exists except the listed ones
#[derive(Default)]
pub struct FakeLocator {
    missing: HashSet<String>,
}

impl FakeLocator {
    pub fn missing(files: &[String]) -> Self {
        Self {
            missing: files.iter().cloned().collect(),
        }
    }
}

impl ModelLocator for FakeLocator {
    fn locate(&self, cell: &Cell) -> Result<PathBuf> {
        if self.missing.contains(&cell.file_name) {
            bail!(edge_bench_rs::MatrixError::ModelFileMissing {
                model: cell.model_id.clone(),
                file: cell.file_name.clone(),
                model_dir: "models".to_string(),
            });
        }
        Ok(PathBuf::from("/models").join(&cell.file_name))
    }
}

pub fn runner(
    config: &Config,
    cells: Vec<Cell>,
    backend: ScriptedBackend,
    workloads: ScriptedWorkloads,
    available_gb: f64,
) -> MatrixRunner {
    MatrixRunner::new(
        config,
        cells,
        "test-signature",
        Box::new(backend),
        Box::new(workloads),
        Box::new(FixedMemory(available_gb)),
        Box::new(FakeLocator::default()),
    )
}
