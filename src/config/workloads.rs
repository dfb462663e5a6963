use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// External command implementing one workload.
///
/// Arguments may contain `{url}`, `{model}`, `{quant}` and `{workload}`
/// placeholders. The command reports back through a `WORKLOAD_RESULT:` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadCommand {
    pub command: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadsConfig {
    pub default_timeout_secs: u64,
    pub commands: BTreeMap<String, WorkloadCommand>,
}

impl Default for WorkloadsConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 600,
            commands: BTreeMap::new(),
        }
    }
}

impl WorkloadsConfig {
    pub fn timeout_for(&self, workload: &str) -> Duration {
        let secs = self
            .commands
            .get(workload)
            .and_then(|c| c.timeout_secs)
            .unwrap_or(self.default_timeout_secs);
        Duration::from_secs(secs)
    }
}
