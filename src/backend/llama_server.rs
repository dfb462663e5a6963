//! llama.cpp `llama-server` process backend

use crate::backend::{Backend, InstanceHandle, Readiness};
use crate::config::BackendConfig;
use crate::error::MatrixError;
use crate::hardware::process_peak_memory;
use crate::matrix::QuantLevel;
use crate::shutdown::ShutdownFlag;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const STOP_POLL: Duration = Duration::from_millis(500);

pub struct LlamaServerBackend {
    config: BackendConfig,
    children: HashMap<u64, Child>,
    next_id: u64,
}

impl LlamaServerBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            children: HashMap::new(),
            next_id: 1,
        }
    }

    fn find_free_port(&self) -> Result<u16> {
        (self.config.port_start..=self.config.port_end)
            .find(|port| TcpListener::bind((self.config.host.as_str(), *port)).is_ok())
            .ok_or_else(|| {
                MatrixError::Backend(format!(
                    "no free port in {}..={}",
                    self.config.port_start, self.config.port_end
                ))
                .into()
            })
    }

    fn health_ok(&self, url: &str) -> bool {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.config.health_timeout_secs))
            .build();
        match agent.get(&format!("{}/health", url)).call() {
            Ok(response) => response.status() == 200,
            Err(_) => false,
        }
    }

    /// SIGTERM, wait up to `grace`, then SIGKILL
    fn terminate(child: &mut Child, grace: Duration) -> Result<()> {
        if child.try_wait()?.is_some() {
            return Ok(());
        }

        Self::send_terminate(child.id());
        let start = Instant::now();
        while start.elapsed() < grace {
            if child.try_wait()?.is_some() {
                tracing::debug!("Server pid={} stopped gracefully", child.id());
                return Ok(());
            }
            thread::sleep(STOP_POLL);
        }

        tracing::warn!(
            "Server pid={} ignored SIGTERM for {}s, killing",
            child.id(),
            grace.as_secs()
        );
        child.kill()?;
        child.wait()?;
        Ok(())
    }

    fn send_terminate(pid: u32) {
        // std::process only offers SIGKILL
        let _ = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}

impl Backend for LlamaServerBackend {
    fn start(&mut self, model_path: &Path, quant: &QuantLevel) -> Result<InstanceHandle> {
        let server = Path::new(&self.config.server_path);
        if !server.exists() {
            return Err(MatrixError::Backend(format!(
                "llama-server not found at {}",
                server.display()
            ))
            .into());
        }
        if !model_path.exists() {
            return Err(MatrixError::Backend(format!(
                "model file not found: {}",
                model_path.display()
            ))
            .into());
        }

        let port = self.find_free_port()?;
        let mut cmd = Command::new(server);
        cmd.arg("--model")
            .arg(model_path)
            .args(["--ctx-size", &self.config.ctx_size.to_string()])
            .args(["--port", &port.to_string()])
            .args(["--host", &self.config.host]);
        if let Some(threads) = self.config.threads {
            cmd.args(["--threads", &threads.to_string()]);
        }
        if let Some(layers) = self.config.n_gpu_layers {
            cmd.args(["--n-gpu-layers", &layers.to_string()]);
        }

        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", server.display()))?;

        let handle = InstanceHandle {
            id: self.next_id,
            url: format!("http://{}:{}", self.config.host, port),
            pid: Some(child.id()),
        };
        self.next_id += 1;
        tracing::info!(
            "Started llama-server pid={} for {} ({}) at {}",
            child.id(),
            model_path.display(),
            quant,
            handle.url
        );
        self.children.insert(handle.id, child);
        Ok(handle)
    }

    fn wait_ready(
        &mut self,
        handle: &InstanceHandle,
        timeout: Duration,
        shutdown: &ShutdownFlag,
    ) -> Result<Readiness> {
        let poll = Duration::from_secs(self.config.poll_interval_secs.max(1));
        let start = Instant::now();

        loop {
            if shutdown.is_requested() {
                return Ok(Readiness::Cancelled);
            }

            let child = self
                .children
                .get_mut(&handle.id)
                .ok_or_else(|| MatrixError::Backend(format!("unknown instance {}", handle.id)))?;
            if let Some(status) = child.try_wait()? {
                return Ok(Readiness::Exited(format!("server exited with {}", status)));
            }

            if self.health_ok(&handle.url) {
                tracing::info!("Server ready after {:.1}s", start.elapsed().as_secs_f64());
                return Ok(Readiness::Ready);
            }

            if start.elapsed() >= timeout {
                tracing::warn!("Server not ready within {}s", timeout.as_secs());
                return Ok(Readiness::TimedOut);
            }
            thread::sleep(poll.min(timeout.saturating_sub(start.elapsed())));
        }
    }

    fn stop(&mut self, handle: &InstanceHandle, grace: Duration) -> Result<()> {
        let Some(mut child) = self.children.remove(&handle.id) else {
            return Ok(());
        };
        let result = Self::terminate(&mut child, grace);
        if result.is_err() {
            // Out of the map, so Drop can no longer reach it
            let _ = child.kill();
            let _ = child.wait();
        }
        result
    }

    fn peak_memory_bytes(&mut self, handle: &InstanceHandle) -> Result<u64> {
        let pid = handle
            .pid
            .ok_or_else(|| MatrixError::Backend("instance has no pid".to_string()))?;
        Ok(process_peak_memory(pid)?)
    }
}

impl Drop for LlamaServerBackend {
    fn drop(&mut self) {
        for (_, mut child) in self.children.drain() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
