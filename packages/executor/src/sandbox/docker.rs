use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Outcome, RunRequest, SandboxError, SandboxRunner, WORKSPACE_MOUNT, classify, read_capped};
use crate::config::DockerConfig;

/// Exit status `docker run` uses for its own failures.
const DOCKER_RUN_FAILURE: i32 = 125;

/// Runs each invocation in a throw-away container through the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerSandbox {
    config: DockerConfig,
    max_output_bytes: usize,
}

/// Container state as read back from `docker inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ContainerState {
    oom_killed: bool,
    exit_code: i32,
    runtime_ms: Option<u64>,
}

impl DockerSandbox {
    pub fn new(config: DockerConfig, max_output_bytes: usize) -> Self {
        Self {
            config,
            max_output_bytes,
        }
    }

    fn run_args(&self, name: &str, request: &RunRequest<'_>) -> Vec<String> {
        let mount_mode = if request.writable { "rw" } else { "ro" };
        let mut args = vec![
            "run".to_string(),
            "--name".to_string(),
            name.to_string(),
            "--network".to_string(),
            "none".to_string(),
            "--memory".to_string(),
            format!("{}m", request.memory_mb),
            "--memory-swap".to_string(),
            format!("{}m", request.memory_mb),
            "--cpus".to_string(),
            self.config.cpus.to_string(),
            "--pids-limit".to_string(),
            self.config.pids_limit.to_string(),
            "--read-only".to_string(),
            "--tmpfs".to_string(),
            format!("/tmp:rw,exec,size={}m", self.config.tmpfs_size_mb),
            "--cap-drop".to_string(),
            "ALL".to_string(),
            "--security-opt".to_string(),
            "no-new-privileges".to_string(),
            "--user".to_string(),
            self.config.user.clone(),
            "-v".to_string(),
            format!(
                "{}:{WORKSPACE_MOUNT}:{mount_mode}",
                request.workspace.to_string_lossy()
            ),
            "-w".to_string(),
            WORKSPACE_MOUNT.to_string(),
        ];
        for (key, value) in request.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.extend([
            "-i".to_string(),
            request.image.to_string(),
            "sh".to_string(),
            "-c".to_string(),
            request.command.to_string(),
        ]);
        args
    }

    async fn inspect(&self, name: &str) -> Result<ContainerState, SandboxError> {
        let output = Command::new(&self.config.bin)
            .args([
                "inspect",
                "--format",
                "{{.State.OOMKilled}}|{{.State.ExitCode}}|{{.State.StartedAt}}|{{.State.FinishedAt}}",
                name,
            ])
            .output()
            .await
            .map_err(|err| SandboxError::Report(format!("failed to execute docker inspect: {err}")))?;

        if !output.status.success() {
            return Err(SandboxError::Report(format!(
                "docker inspect failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_inspect(&String::from_utf8_lossy(&output.stdout))
    }

    async fn kill(&self, name: &str) {
        let result = Command::new(&self.config.bin)
            .args(["kill", "--signal", "KILL", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(err) = result {
            warn!(container = name, error = %err, "Failed to kill container");
        }
    }
}

fn parse_inspect(raw: &str) -> Result<ContainerState, SandboxError> {
    let fields: Vec<&str> = raw.trim().split('|').collect();
    let [oom, exit, started, finished] = fields.as_slice() else {
        return Err(SandboxError::Report(format!("unexpected inspect output: {raw}")));
    };
    let oom_killed = oom
        .parse::<bool>()
        .map_err(|_| SandboxError::Report(format!("bad OOMKilled value: {oom}")))?;
    let exit_code = exit
        .parse::<i32>()
        .map_err(|_| SandboxError::Report(format!("bad ExitCode value: {exit}")))?;
    let runtime_ms = match (
        DateTime::parse_from_rfc3339(started),
        DateTime::parse_from_rfc3339(finished),
    ) {
        (Ok(start), Ok(end)) if end >= start => {
            Some((end.with_timezone(&Utc) - start.with_timezone(&Utc)).num_milliseconds() as u64)
        }
        _ => None,
    };
    Ok(ContainerState {
        oom_killed,
        exit_code,
        runtime_ms,
    })
}

/// Force-removes the container when dropped, including on cancellation.
struct ContainerGuard {
    bin: String,
    name: String,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let mut command = std::process::Command::new(&self.bin);
        command
            .args(["rm", "--force", &self.name])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let name = self.name.clone();
                handle.spawn_blocking(move || {
                    if let Err(err) = command.status() {
                        warn!(container = %name, error = %err, "Failed to remove container");
                    }
                });
            }
            Err(_) => {
                let _ = command.status();
            }
        }
    }
}

#[async_trait]
impl SandboxRunner for DockerSandbox {
    async fn run(&self, request: &RunRequest<'_>) -> Result<Outcome, SandboxError> {
        let name = format!("judge-{}", Uuid::new_v4().simple());
        let deadline = Instant::now()
            + Duration::from_millis(request.wall_ms + self.config.startup_grace_ms);

        let mut command = Command::new(&self.config.bin);
        command
            .args(self.run_args(&name, request))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = command.spawn().map_err(|err| {
            SandboxError::Initialization(format!("failed to execute docker run: {err}"))
        })?;
        let _guard = ContainerGuard {
            bin: self.config.bin.clone(),
            name: name.clone(),
        };
        debug!(container = %name, image = request.image, "Container launched");

        if let Some(mut stdin) = child.stdin.take() {
            let input = request.stdin.to_vec();
            tokio::spawn(async move {
                // The program may exit without reading its input.
                let _ = stdin.write_all(&input).await;
                let _ = stdin.shutdown().await;
            });
        }
        let cap = self.max_output_bytes;
        let stdout = child.stdout.take().map(|s| tokio::spawn(read_capped(s, cap)));
        let stderr = child.stderr.take().map(|s| tokio::spawn(read_capped(s, cap)));

        let waited = timeout_at(deadline, child.wait()).await;
        let deadline_fired = waited.is_err();
        if deadline_fired {
            self.kill(&name).await;
            let _ = child.kill().await;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let stdout = match stdout {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        let stderr = match stderr {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if let Ok(status) = &waited {
            let status = status.as_ref().map_err(|err| {
                SandboxError::Execution(format!("failed to wait for docker run: {err}"))
            })?;
            if status.code() == Some(DOCKER_RUN_FAILURE) {
                return Err(SandboxError::Initialization(format!(
                    "docker run failed: {}",
                    stderr.trim()
                )));
            }
        }

        let state = self.inspect(&name).await?;
        let wall_ms = state.runtime_ms.unwrap_or(elapsed_ms);
        let timed_out = deadline_fired || wall_ms > request.wall_ms;
        let exit_code = (!deadline_fired).then_some(state.exit_code);

        Ok(Outcome {
            stdout,
            stderr,
            exit_code,
            wall_ms,
            memory_kb: None,
            class: classify(state.oom_killed, timed_out, exit_code),
        })
    }
}
