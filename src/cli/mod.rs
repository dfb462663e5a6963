pub mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "edge_bench")]
#[command(about = "Benchmark model quantizations on constrained hardware", long_about = None)]
pub struct Cli {
    /// Log filter (e.g. info, debug, edge_bench_rs=trace). Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs that shape the matrix
#[derive(Args, Debug, Clone)]
pub struct MatrixArgs {
    /// Quick mode: the catalog's (or config's) quick quantization set
    #[arg(long, conflicts_with = "full")]
    pub quick: bool,
    /// Full mode: every configured quantization level
    #[arg(long)]
    pub full: bool,
    /// Restrict to these models (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub models: Vec<String>,
    /// Explicit quantization list (comma-separated), overrides --quick/--full
    #[arg(long)]
    pub quants: Option<String>,
    /// Workloads to run (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub profiles: Vec<String>,
    #[arg(long)]
    pub skip_quality: bool,
    #[arg(long)]
    pub skip_stress: bool,
    /// Maximum memory to use in GB
    #[arg(long)]
    pub max_memory: Option<f64>,
    /// Configuration file
    #[arg(long, default_value = "edge_bench.json")]
    pub config: String,
    /// Model catalog, defaults to the config's paths.models_config
    #[arg(long)]
    pub models_config: Option<String>,
}

impl MatrixArgs {
    /// Flags that reproduce this matrix on a later invocation
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.full {
            out.push("--full".to_string());
        }
        if self.quick {
            out.push("--quick".to_string());
        }
        if !self.models.is_empty() {
            out.push(format!("--models={}", self.models.join(",")));
        }
        if let Some(quants) = &self.quants {
            out.push(format!("--quants={}", quants));
        }
        if !self.profiles.is_empty() {
            out.push(format!("--profiles={}", self.profiles.join(",")));
        }
        if self.skip_quality {
            out.push("--skip-quality".to_string());
        }
        if self.skip_stress {
            out.push("--skip-stress".to_string());
        }
        if let Some(max_memory) = self.max_memory {
            out.push(format!("--max-memory={}", max_memory));
        }
        out.push(format!("--config={}", self.config));
        if let Some(models_config) = &self.models_config {
            out.push(format!("--models-config={}", models_config));
        }
        out
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark matrix
    Run {
        #[command(flatten)]
        matrix: MatrixArgs,
        /// Where to write checkpoints
        #[arg(long)]
        checkpoint: Option<String>,
        /// Resume from this checkpoint
        #[arg(long)]
        resume: Option<String>,
        /// Save results to JSON file
        #[arg(long)]
        output: Option<String>,
        /// Print the plan without starting any backend
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the ordered matrix with memory predictions and preflight decisions
    Plan {
        #[command(flatten)]
        matrix: MatrixArgs,
    },
    /// Show progress recorded in a checkpoint
    Status {
        #[arg(long)]
        checkpoint: String,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            matrix,
            checkpoint,
            resume,
            output,
            dry_run,
        } => {
            if dry_run {
                commands::plan(matrix)
            } else {
                commands::run(matrix, checkpoint, resume, output)
            }
        }
        Commands::Plan { matrix } => commands::plan(matrix),
        Commands::Status { checkpoint } => commands::status(checkpoint),
    }
}
