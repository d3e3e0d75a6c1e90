use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use super::{Outcome, RunRequest, SandboxError, SandboxRunner, WORKSPACE_MOUNT, classify, read_capped};
use crate::config::IsolateConfig;

/// Search path inside a box; isolate starts programs with an empty environment.
const BOX_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Runs invocations in isolate(1) control-group boxes.
///
/// The image tag of a request is ignored: boxes see the host toolchains
/// under `/usr` through isolate's default directory rules.
#[derive(Debug)]
pub struct IsolateSandbox {
    config: IsolateConfig,
    max_output_bytes: usize,
    pool: BoxPool,
}

/// Fields of an isolate `--meta` file that the verdict depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MetaReport {
    pub status: Option<String>,
    pub exit_code: Option<i32>,
    pub wall_ms: Option<u64>,
    pub memory_kb: Option<u64>,
    pub oom_killed: bool,
    pub message: Option<String>,
}

impl MetaReport {
    pub(crate) fn parse(content: &str) -> Self {
        let mut raw = HashMap::<&str, &str>::new();
        let mut oom_killed = false;

        for line in content.lines() {
            if let Some((key, value)) = line.split_once(':') {
                raw.insert(key.trim(), value.trim());
            } else if line.trim() == "cg-oom-killed" {
                oom_killed = true;
            }
        }
        if raw.contains_key("cg-oom-killed") {
            oom_killed = true;
        }

        Self {
            status: raw.get("status").map(|s| s.to_string()),
            exit_code: raw.get("exitcode").and_then(|v| v.parse().ok()),
            wall_ms: raw
                .get("time-wall")
                .and_then(|v| v.parse::<f64>().ok())
                .map(|secs| (secs * 1000.0).round() as u64),
            memory_kb: raw
                .get("cg-mem")
                .or_else(|| raw.get("max-rss"))
                .and_then(|v| v.parse().ok()),
            oom_killed,
            message: raw.get("message").map(|s| s.to_string()),
        }
    }

    /// `XX` marks a failure of isolate itself.
    fn internal_error(&self) -> bool {
        self.status.as_deref() == Some("XX")
    }

    fn timed_out(&self) -> bool {
        self.status.as_deref() == Some("TO")
    }
}

/// Box ids not currently leased. The semaphore holds one permit per free id.
#[derive(Debug)]
struct BoxPool {
    free: Arc<Mutex<Vec<u32>>>,
    permits: Arc<Semaphore>,
}

fn lock_ids(ids: &Mutex<Vec<u32>>) -> MutexGuard<'_, Vec<u32>> {
    ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BoxPool {
    fn new(size: u32) -> Self {
        let size = size.max(1);
        Self {
            // Reversed so that ids are handed out lowest first.
            free: Arc::new(Mutex::new((0..size).rev().collect())),
            permits: Arc::new(Semaphore::new(size as usize)),
        }
    }

    /// Wait until a box is free and take it exclusively.
    async fn lease(&self, bin: &str) -> Result<BoxLease, SandboxError> {
        let permit = self.permits.clone().acquire_owned().await.map_err(|_| {
            SandboxError::Initialization("isolate box pool is closed".to_string())
        })?;
        let box_id = lock_ids(&self.free).pop().ok_or_else(|| {
            SandboxError::Initialization("isolate box pool is empty".to_string())
        })?;
        Ok(BoxLease {
            box_id,
            bin: bin.to_string(),
            free: Some(self.free.clone()),
            permit: Some(permit),
        })
    }
}

/// Exclusive use of one box. Dropping it runs `isolate --cleanup` and only
/// then returns the id to the pool.
struct BoxLease {
    box_id: u32,
    bin: String,
    free: Option<Arc<Mutex<Vec<u32>>>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for BoxLease {
    fn drop(&mut self) {
        let mut command = std::process::Command::new(&self.bin);
        command
            .arg(format!("--box-id={}", self.box_id))
            .arg("--cg")
            .arg("--cleanup")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let box_id = self.box_id;
        let free = self.free.take();
        let permit = self.permit.take();

        let release = move || {
            if let Err(err) = command.status() {
                warn!(box_id, error = %err, "isolate --cleanup failed");
            }
            if let Some(free) = free {
                lock_ids(&free).push(box_id);
            }
            drop(permit);
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(release);
            }
            Err(_) => release(),
        }
    }
}

impl IsolateSandbox {
    pub fn new(config: IsolateConfig, max_output_bytes: usize) -> Self {
        Self {
            pool: BoxPool::new(config.box_pool),
            config,
            max_output_bytes,
        }
    }

    async fn init_box(&self, box_id: u32) -> Result<(), SandboxError> {
        let output = Command::new(&self.config.bin)
            .arg(format!("--box-id={box_id}"))
            .arg("--cg")
            .arg("--init")
            .output()
            .await
            .map_err(|err| {
                SandboxError::Initialization(format!("failed to execute isolate --init: {err}"))
            })?;

        if !output.status.success() {
            return Err(SandboxError::Initialization(format!(
                "isolate --init failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn run_args(
        &self,
        box_id: u32,
        meta_path: &Path,
        stdin_path: &Path,
        request: &RunRequest<'_>,
    ) -> Vec<String> {
        let wall_secs = request.wall_ms as f64 / 1000.0;
        let dir_rule = if request.writable {
            format!(
                "--dir={WORKSPACE_MOUNT}={}:rw",
                request.workspace.to_string_lossy()
            )
        } else {
            format!(
                "--dir={WORKSPACE_MOUNT}={}",
                request.workspace.to_string_lossy()
            )
        };

        let mut args = vec![
            format!("--box-id={box_id}"),
            "--cg".to_string(),
            format!("--meta={}", meta_path.to_string_lossy()),
            format!("--time={wall_secs}"),
            format!("--wall-time={wall_secs}"),
            format!("--extra-time={}", self.config.extra_time_secs),
            format!("--cg-mem={}", request.memory_mb * 1024),
            format!("--processes={}", self.config.process_limit),
            dir_rule,
            format!("--chdir={WORKSPACE_MOUNT}"),
            format!("--env=PATH={BOX_PATH}"),
            "--env=HOME=/tmp".to_string(),
        ];
        for (key, value) in request.env {
            args.push(format!("--env={key}={value}"));
        }
        args.push(format!("--stdin={}", stdin_path.to_string_lossy()));
        args.extend([
            "--run".to_string(),
            "--".to_string(),
            "/bin/sh".to_string(),
            "-c".to_string(),
            request.command.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl SandboxRunner for IsolateSandbox {
    async fn run(&self, request: &RunRequest<'_>) -> Result<Outcome, SandboxError> {
        let lease = self.pool.lease(&self.config.bin).await?;
        let box_id = lease.box_id;
        // isolate enforces the limits; this outer deadline only catches a wedged supervisor.
        let deadline = Instant::now()
            + Duration::from_millis(request.wall_ms)
            + Duration::from_secs_f64(self.config.extra_time_secs + 2.0);

        let scratch = tempfile::tempdir().map_err(|err| {
            SandboxError::Initialization(format!("failed to create isolate scratch dir: {err}"))
        })?;
        let meta_path = scratch.path().join("run.meta");
        let stdin_path = scratch.path().join("stdin");
        tokio::fs::write(&stdin_path, request.stdin)
            .await
            .map_err(|err| SandboxError::Initialization(format!("failed to stage stdin: {err}")))?;

        self.init_box(box_id).await?;
        debug!(box_id, "isolate box initialised");

        let mut child = Command::new(&self.config.bin)
            .args(self.run_args(box_id, &meta_path, &stdin_path, request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                SandboxError::Execution(format!("failed to execute isolate --run: {err}"))
            })?;

        let cap = self.max_output_bytes;
        let stdout = child.stdout.take().map(|s| tokio::spawn(read_capped(s, cap)));
        let stderr = child.stderr.take().map(|s| tokio::spawn(read_capped(s, cap)));

        let status = match timeout_at(deadline, child.wait()).await {
            Ok(status) => status.map_err(|err| {
                SandboxError::Execution(format!("failed to wait for isolate --run: {err}"))
            })?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(SandboxError::Execution(format!(
                    "isolate box {box_id} did not finish within its deadline"
                )));
            }
        };

        let stdout = match stdout {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        let stderr = match stderr {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        // 0: program succeeded, 1: program failed. Anything else is isolate's own failure.
        if !matches!(status.code(), Some(0) | Some(1)) {
            return Err(SandboxError::Execution(format!(
                "isolate internal error: {}",
                stderr.trim()
            )));
        }

        let content = tokio::fs::read_to_string(&meta_path).await.map_err(|err| {
            SandboxError::Report(format!("failed to read isolate meta file: {err}"))
        })?;
        let meta = MetaReport::parse(&content);
        if meta.internal_error() {
            return Err(SandboxError::Execution(format!(
                "isolate reported XX: {}",
                meta.message.unwrap_or_default()
            )));
        }

        let wall_ms = meta.wall_ms.unwrap_or(0);
        let timed_out = meta.timed_out() || wall_ms > request.wall_ms;
        Ok(Outcome {
            stdout,
            stderr,
            exit_code: meta.exit_code,
            wall_ms,
            memory_kb: meta.memory_kb,
            class: classify(meta.oom_killed, timed_out, meta.exit_code),
        })
    }
}
