//! Workload execution against a running backend

pub mod command;

use crate::backend::InstanceHandle;
use crate::matrix::QuantLevel;
use crate::shutdown::ShutdownFlag;
use crate::termination::WorkloadStatus;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub use command::{CommandWorkloadRunner, WORKLOAD_RESULT_MARKER};

/// What a workload reports; metrics are opaque to the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadOutcome {
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    pub status: WorkloadStatus,
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkloadOutcome {
    pub fn completed(metrics: BTreeMap<String, f64>) -> Self {
        Self {
            metrics,
            status: WorkloadStatus::Completed,
            error: None,
        }
    }
}

pub struct WorkloadContext<'a> {
    pub model_id: &'a str,
    pub quant: &'a QuantLevel,
    pub timeout: Duration,
    pub shutdown: &'a ShutdownFlag,
}

pub trait WorkloadRunner {
    fn run(
        &mut self,
        workload_id: &str,
        instance: &InstanceHandle,
        ctx: &WorkloadContext<'_>,
    ) -> Result<WorkloadOutcome>;
}
