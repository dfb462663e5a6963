//! CLI command implementations

use crate::cli::MatrixArgs;
use anyhow::{bail, Context, Result};
use edge_bench_rs::backend::LlamaServerBackend;
use edge_bench_rs::checkpoints::CheckpointStore;
use edge_bench_rs::config::{Config, ModelCatalog};
use edge_bench_rs::hardware::{MemoryInfo, SystemMemory};
use edge_bench_rs::matrix::{matrix_signature, parse_quant_list, Cell, CellStatus, MatrixBuilder, QuantLevel};
use edge_bench_rs::prediction::Admission;
use edge_bench_rs::runner::{EventLog, MatrixRunner, RULE};
use edge_bench_rs::shutdown::{install_ctrlc_handler, ShutdownFlag};
use edge_bench_rs::utils::ModelStore;
use edge_bench_rs::workloads::CommandWorkloadRunner;
use edge_bench_rs::MatrixError;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything derived from the command line before any backend starts
struct PreparedMatrix {
    config: Config,
    catalog: ModelCatalog,
    quants: Vec<QuantLevel>,
    cells: Vec<Cell>,
    signature: String,
    store: ModelStore,
}

fn prepare(args: &MatrixArgs) -> Result<PreparedMatrix> {
    let mut config = Config::load(&args.config)?;
    if let Some(max_memory) = args.max_memory {
        config.limits.max_memory_gb = max_memory;
    }
    if let Some(models_config) = &args.models_config {
        config.paths.models_config = models_config.clone();
    }

    if !args.profiles.is_empty() {
        config.matrix.enabled_workloads = args.profiles.clone();
    }
    if args.skip_quality {
        config.matrix.enabled_workloads.retain(|w| w != "quality");
    }
    if args.skip_stress {
        config.matrix.enabled_workloads.retain(|w| w != "stress");
    }
    config.validate()?;
    config.check_workload_commands()?;

    let mut catalog = ModelCatalog::load(&config.paths.models_config)?;
    catalog.validate()?;
    if !args.models.is_empty() {
        catalog.retain_models(&args.models)?;
    }

    let requested = match &args.quants {
        Some(list) => parse_quant_list(list),
        None if args.full => catalog
            .full_mode_quants
            .clone()
            .unwrap_or_else(|| config.matrix.full_mode_quants.clone()),
        None => catalog
            .quick_mode_quants
            .clone()
            .unwrap_or_else(|| config.matrix.quick_mode_quants.clone()),
    };
    if requested.is_empty() {
        bail!("No quantization levels requested");
    }

    let builder = MatrixBuilder::new(config.matrix.quant_priority.clone());
    let quants = builder.order_quants(&requested);
    let mut cells = builder.build(&catalog, &requested)?;

    let store = ModelStore::new(&config.paths.model_dir);
    store.annotate_file_sizes(&mut cells, &catalog);

    let signature = matrix_signature(&catalog, &quants, &config.thresholds)?;

    Ok(PreparedMatrix {
        config,
        catalog,
        quants,
        cells,
        signature,
        store,
    })
}

fn print_header(title: &str, prepared: &PreparedMatrix) {
    println!("{}", RULE);
    println!("{}", title);
    println!("{}", RULE);
    if let Ok(info) = MemoryInfo::current() {
        println!(
            "System Memory: {} ({} available)",
            MemoryInfo::format_bytes(info.system_total_bytes),
            MemoryInfo::format_bytes(info.system_available_bytes)
        );
    }
    println!("Memory limit: {:.1} GB", prepared.config.limits.max_memory_gb);
    println!("Models: {}", prepared.catalog.models.len());
    println!(
        "Quantizations: {}",
        prepared
            .quants
            .iter()
            .map(|q| q.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "Workloads: {}",
        prepared.config.matrix.enabled_workloads.join(", ")
    );
    println!("Cells: {}", prepared.cells.len());
    println!();
}

fn build_runner(prepared: PreparedMatrix) -> MatrixRunner {
    let PreparedMatrix {
        config,
        cells,
        signature,
        store,
        ..
    } = prepared;

    MatrixRunner::new(
        &config,
        cells,
        signature,
        Box::new(LlamaServerBackend::new(config.backend.clone())),
        Box::new(CommandWorkloadRunner::new(config.workloads.clone())),
        Box::new(SystemMemory),
        Box::new(store),
    )
}

pub fn plan(args: MatrixArgs) -> Result<()> {
    let prepared = prepare(&args)?;
    print_header("Matrix Plan (dry run)", &prepared);

    let mut runner = build_runner(prepared);
    let entries = runner.plan()?;

    println!(
        "{:<4} {:<32} {:<8} {:<6} {:>10}  {:<13} Preflight",
        "#", "Model", "Quant", "Size", "Memory", "Confidence"
    );
    for (i, entry) in entries.iter().enumerate() {
        let decision = match &entry.admission {
            Admission::Allow => "✓ run".to_string(),
            Admission::Skip(reason) => format!("✗ {}", reason),
        };
        println!(
            "{:<4} {:<32} {:<8} {:<6} {:>7.1} GB  {:<13} {}",
            i + 1,
            entry.key.model_id,
            entry.key.quant.to_string(),
            entry.size_class.to_string(),
            entry.prediction.memory_gb,
            entry.prediction.confidence.to_string(),
            decision
        );
    }

    let admitted = entries.iter().filter(|e| e.admission.is_allowed()).count();
    println!();
    println!(
        "{} of {} cells pass preflight with no measurements yet",
        admitted,
        entries.len()
    );
    println!("{}", RULE);
    Ok(())
}

pub fn run(
    args: MatrixArgs,
    checkpoint: Option<String>,
    resume: Option<String>,
    output: Option<String>,
) -> Result<()> {
    let prepared = prepare(&args)?;
    print_header("Matrix Benchmark", &prepared);

    let checkpoint_path: PathBuf = match (&resume, &checkpoint) {
        (Some(path), _) | (None, Some(path)) => PathBuf::from(path),
        (None, None) => prepared.config.paths.checkpoint_file(),
    };
    let results_path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| prepared.config.paths.results_file());
    let event_log_path = prepared.config.paths.event_log_file();

    let store = CheckpointStore::new(&checkpoint_path);
    let saved = if resume.is_some() {
        // A mismatch surfaces as CheckpointMismatch
        match store.load(&prepared.signature)?.into_result()? {
            Some(cp) => Some(cp),
            None => bail!("No checkpoint found at {}", checkpoint_path.display()),
        }
    } else {
        if checkpoint_path.exists() {
            tracing::warn!(
                "Overwriting existing checkpoint {} (use --resume to continue it)",
                checkpoint_path.display()
            );
        }
        None
    };

    let cell_count = prepared.cells.len();
    let mut runner = build_runner(prepared).with_checkpoint(store);
    if let Some(cp) = saved {
        let (done, total) = cp.progress();
        println!("Resuming: {}/{} cells already complete", done, total);
        runner.resume(cp)?;
    }

    match EventLog::open(&event_log_path) {
        Ok(log) => {
            println!("Event log: {}", event_log_path.display());
            runner = runner.with_event_log(log);
        }
        Err(e) => tracing::warn!(
            "Could not open event log {}: {:#}",
            event_log_path.display(),
            e
        ),
    }
    println!("Checkpoint: {}", checkpoint_path.display());
    println!();

    let shutdown = ShutdownFlag::new();
    install_ctrlc_handler(&shutdown)?;

    let pb = ProgressBar::new(cell_count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ETA:{eta} {msg}")?
            .progress_chars("=>-"),
    );

    let outcome = runner
        .with_shutdown(shutdown)
        .with_progress(pb)
        .run()?;

    write_results(&results_path, &outcome.summary, &outcome.results)?;
    outcome.summary.print_summary();
    println!("{}", RULE);
    println!("Results saved to: {}", results_path.display());

    if outcome.interrupted {
        println!();
        println!("⚠️  Run interrupted. Resume with:");
        println!("  {}", resume_command(&args, &checkpoint_path));
        return Err(MatrixError::Interrupted.into());
    }
    Ok(())
}

/// Command line that resumes this run against the same matrix signature
fn resume_command(args: &MatrixArgs, checkpoint: &Path) -> String {
    let mut parts = vec![
        "edge_bench run".to_string(),
        format!("--resume={}", checkpoint.display()),
    ];
    parts.extend(args.to_cli_args());
    parts.join(" ")
}

fn write_results<T: serde::Serialize, R: serde::Serialize>(
    path: &Path,
    summary: &T,
    results: &R,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::json!({
        "summary": summary,
        "results": results,
    });
    fs::write(path, serde_json::to_string_pretty(&data)?)
        .with_context(|| format!("Failed to write results to {}", path.display()))
}

pub fn status(checkpoint: String) -> Result<()> {
    let store = CheckpointStore::new(&checkpoint);
    let Some(cp) = store.read()? else {
        bail!("No checkpoint found at {}", store.path().display());
    };

    let (done, total) = cp.progress();
    println!("{}", RULE);
    println!("Checkpoint Status");
    println!("{}", RULE);
    println!("File:       {}", store.path().display());
    println!("Signature:  {}", cp.matrix_signature);
    println!("Started:    {}", cp.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated:    {}", cp.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Progress:   {}/{} cells", done, total);
    println!();

    for status in [
        CellStatus::Pending,
        CellStatus::Passed,
        CellStatus::Partial,
        CellStatus::Failed,
        CellStatus::Error,
        CellStatus::SkippedPreflight,
        CellStatus::SkippedPredicted,
        CellStatus::SkippedPath,
    ] {
        let n = cp.count(status);
        if n > 0 {
            println!("  {:<18} {}", status.as_str(), n);
        }
    }

    println!();
    println!("Memory samples: {}", cp.memory_samples.len());
    for sample in &cp.memory_samples {
        println!(
            "  {} {}: {:.2} GB",
            sample.size_class, sample.quant, sample.peak_memory_gb
        );
    }

    if !cp.directives.is_empty() {
        println!();
        println!("Active directives:");
        for d in &cp.directives {
            println!("  [{}] {} -> {}", d.rule, d.reason, d.skip_status);
        }
    }
    println!("{}", RULE);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_command_keeps_matrix_flags() {
        let args = MatrixArgs {
            quick: false,
            full: true,
            models: vec!["tiny".to_string()],
            quants: None,
            profiles: Vec::new(),
            skip_quality: false,
            skip_stress: false,
            max_memory: None,
            config: "edge_bench.json".to_string(),
            models_config: None,
        };
        let line = resume_command(&args, Path::new("out/checkpoint.json"));
        assert_eq!(
            line,
            "edge_bench run --resume=out/checkpoint.json --full --models=tiny --config=edge_bench.json"
        );
    }
}
