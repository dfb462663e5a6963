//! Inference backend lifecycle

pub mod llama_server;

use crate::matrix::QuantLevel;
use crate::shutdown::ShutdownFlag;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub use llama_server::LlamaServerBackend;

/// A started backend instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceHandle {
    pub id: u64,
    pub url: String,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
    /// Process died before reporting healthy
    Exited(String),
    /// Interrupt observed while waiting
    Cancelled,
}

/// Starts, probes and stops one model server at a time
pub trait Backend {
    fn start(&mut self, model_path: &Path, quant: &QuantLevel) -> Result<InstanceHandle>;

    fn wait_ready(
        &mut self,
        handle: &InstanceHandle,
        timeout: Duration,
        shutdown: &ShutdownFlag,
    ) -> Result<Readiness>;

    /// Graceful stop within `grace`, then forced. Unknown handles are a no-op.
    fn stop(&mut self, handle: &InstanceHandle, grace: Duration) -> Result<()>;

    fn peak_memory_bytes(&mut self, handle: &InstanceHandle) -> Result<u64>;
}
