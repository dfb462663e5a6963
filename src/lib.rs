//! Matrix scheduling and smart termination for LLM inference benchmarks
//!
//! Benchmarks a grid of (model, quantization) cells on constrained hardware
//! without brute-forcing every cell. The grid is traversed quantization-major,
//! memory is predicted from what has already run, and failures prune the
//! cells they make futile.
//!
//! ## Main Components
//!
//! - `matrix`: Cells, quantization tables, ordered grid construction
//! - `prediction`: Online memory predictor and preflight gate
//! - `termination`: Classification and pruning directives
//! - `checkpoints`: Crash-safe, signature-checked run snapshots
//! - `runner`: The orchestration loop
//! - `backend` / `workloads`: Process-based collaborators behind traits

pub mod backend;
pub mod checkpoints;
pub mod config;
pub mod error;
pub mod hardware;
pub mod matrix;
pub mod prediction;
pub mod runner;
pub mod shutdown;
pub mod termination;
pub mod utils;
pub mod workloads;

pub use config::Config;
pub use error::MatrixError;
pub use matrix::{Cell, CellStatus, MatrixBuilder};
pub use runner::{MatrixRunner, RunOutcome};

/// Library errors
pub use anyhow::{Error, Result};
