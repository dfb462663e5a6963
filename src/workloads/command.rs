use crate::backend::InstanceHandle;
use crate::config::WorkloadsConfig;
use crate::error::MatrixError;
use crate::workloads::{WorkloadContext, WorkloadOutcome, WorkloadRunner};
use anyhow::{Context, Result};
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Prefix of the stdout line carrying a workload's JSON result
pub const WORKLOAD_RESULT_MARKER: &str = "WORKLOAD_RESULT:";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Runs operator-supplied commands, one per workload
pub struct CommandWorkloadRunner {
    config: WorkloadsConfig,
}

impl CommandWorkloadRunner {
    pub fn new(config: WorkloadsConfig) -> Self {
        Self { config }
    }

    fn expand(arg: &str, workload_id: &str, instance: &InstanceHandle, ctx: &WorkloadContext<'_>) -> String {
        arg.replace("{url}", &instance.url)
            .replace("{model}", ctx.model_id)
            .replace("{quant}", ctx.quant.name())
            .replace("{workload}", workload_id)
    }
}

/// Last `WORKLOAD_RESULT:` line in the captured output
pub fn parse_result(output: &str) -> Option<Result<WorkloadOutcome, serde_json::Error>> {
    output
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(WORKLOAD_RESULT_MARKER))
        .map(serde_json::from_str)
}

impl WorkloadRunner for CommandWorkloadRunner {
    fn run(
        &mut self,
        workload_id: &str,
        instance: &InstanceHandle,
        ctx: &WorkloadContext<'_>,
    ) -> Result<WorkloadOutcome> {
        let spec = self.config.commands.get(workload_id).ok_or_else(|| MatrixError::Workload {
            workload: workload_id.to_string(),
            message: "no command configured".to_string(),
        })?;
        let args: Vec<String> = spec
            .command
            .iter()
            .map(|a| Self::expand(a, workload_id, instance, ctx))
            .collect();
        let (program, rest) = args.split_first().ok_or_else(|| MatrixError::Workload {
            workload: workload_id.to_string(),
            message: "empty command".to_string(),
        })?;

        let mut stdout = tempfile::tempfile().context("Failed to create output capture file")?;
        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn workload command {}", program))?;

        tracing::debug!("Workload {} running as pid {}", workload_id, child.id());
        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if ctx.shutdown.is_requested() || start.elapsed() >= ctx.timeout {
                let _ = child.kill();
                let _ = child.wait();
                let message = if ctx.shutdown.is_requested() {
                    "interrupted".to_string()
                } else {
                    format!("timed out after {}s", ctx.timeout.as_secs())
                };
                return Err(MatrixError::Workload {
                    workload: workload_id.to_string(),
                    message,
                }
                .into());
            }
            thread::sleep(POLL_INTERVAL);
        };

        let mut output = String::new();
        stdout.seek(SeekFrom::Start(0))?;
        stdout.read_to_string(&mut output)?;

        match parse_result(&output) {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(e)) => Err(MatrixError::Workload {
                workload: workload_id.to_string(),
                message: format!("malformed result line: {}", e),
            }
            .into()),
            None => Err(MatrixError::Workload {
                workload: workload_id.to_string(),
                message: format!("no {} marker in output (exit {})", WORKLOAD_RESULT_MARKER, status),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkloadCommand;
    use crate::matrix::QuantLevel;
    use crate::shutdown::ShutdownFlag;
    use crate::termination::WorkloadStatus;

    fn instance() -> InstanceHandle {
        InstanceHandle {
            id: 1,
            url: "http://127.0.0.1:8080".into(),
            pid: None,
        }
    }

    fn runner(name: &str, command: &[&str], timeout_secs: u64) -> CommandWorkloadRunner {
        let mut config = WorkloadsConfig::default();
        config.commands.insert(
            name.to_string(),
            WorkloadCommand {
                command: command.iter().map(|s| s.to_string()).collect(),
                timeout_secs: Some(timeout_secs),
            },
        );
        CommandWorkloadRunner::new(config)
    }

    #[test]
    fn test_parse_result_uses_last_marker() {
        let output = "noise\nWORKLOAD_RESULT:{\"status\":\"error\"}\nWORKLOAD_RESULT:{\"metrics\":{\"tokens_per_sec\":12.5},\"status\":\"completed\"}\n";
        let outcome = parse_result(output).unwrap().unwrap();
        assert_eq!(outcome.status, WorkloadStatus::Completed);
        assert_eq!(outcome.metrics["tokens_per_sec"], 12.5);
        assert!(parse_result("nothing here").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_output_is_parsed() {
        let mut runner = runner(
            "interactive",
            &[
                "sh",
                "-c",
                "echo 'WORKLOAD_RESULT:{\"metrics\":{\"ttft\":1.5},\"status\":\"completed\"}' # {url} {quant}",
            ],
            10,
        );
        let shutdown = ShutdownFlag::new();
        let quant = QuantLevel::new("Q4_K_M");
        let ctx = WorkloadContext {
            model_id: "m",
            quant: &quant,
            timeout: Duration::from_secs(10),
            shutdown: &shutdown,
        };
        let outcome = runner.run("interactive", &instance(), &ctx).unwrap();
        assert_eq!(outcome.metrics["ttft"], 1.5);
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_command() {
        let mut runner = runner("stress", &["sleep", "30"], 1);
        let shutdown = ShutdownFlag::new();
        let quant = QuantLevel::new("Q4_K_M");
        let ctx = WorkloadContext {
            model_id: "m",
            quant: &quant,
            timeout: Duration::from_millis(500),
            shutdown: &shutdown,
        };
        let start = Instant::now();
        let err = runner.run("stress", &instance(), &ctx).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_unconfigured_workload() {
        let mut runner = CommandWorkloadRunner::new(WorkloadsConfig::default());
        let shutdown = ShutdownFlag::new();
        let quant = QuantLevel::new("Q4_K_M");
        let ctx = WorkloadContext {
            model_id: "m",
            quant: &quant,
            timeout: Duration::from_secs(1),
            shutdown: &shutdown,
        };
        assert!(runner.run("quality", &instance(), &ctx).is_err());
    }
}
