use std::path::Path;
use std::sync::Arc;

use common::ExecClass;
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, error, instrument};

use crate::config::SandboxConfig;
use crate::error::Result;
use crate::languages::{self, LanguageProfile};
use crate::sandbox::{Outcome, RunRequest, SandboxRunner};

/// One (code, language, input) execution request.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest<'a> {
    pub code: &'a str,
    pub language: &'a str,
    pub stdin: &'a str,
    /// Overrides the profile's default wall time.
    pub wall_ms: Option<u64>,
    /// Overrides the profile's default memory cap.
    pub memory_mb: Option<u64>,
}

/// Folded outcome of the compile and run phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub class: ExecClass,
    pub wall_ms: u64,
    pub memory_kb: Option<u64>,
    pub exit_code: Option<i32>,
    /// Wall-time cap the run phase was given, after clamping.
    pub wall_limit_ms: u64,
}

impl ExecResult {
    fn sandbox_failure(wall_limit_ms: u64) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            class: ExecClass::SandboxError,
            wall_ms: 0,
            memory_kb: None,
            exit_code: None,
            wall_limit_ms,
        }
    }

    fn from_outcome(outcome: Outcome, wall_limit_ms: u64) -> Self {
        Self {
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            class: outcome.class,
            wall_ms: outcome.wall_ms,
            memory_kb: outcome.memory_kb,
            exit_code: outcome.exit_code,
            wall_limit_ms,
        }
    }
}

/// Materialises a workspace per request and drives compile-then-run
/// through a [`SandboxRunner`].
pub struct Executor {
    runner: Arc<dyn SandboxRunner>,
    config: SandboxConfig,
}

impl Executor {
    pub fn new(runner: Arc<dyn SandboxRunner>, config: SandboxConfig) -> Self {
        Self { runner, config }
    }

    /// Executor backed by the runner named in `config.backend`.
    pub fn from_config(config: SandboxConfig) -> Self {
        let runner = crate::sandbox::build_runner(&config);
        Self::new(runner, config)
    }

    /// Effective caps: caller override, else profile default, clamped to the configured maxima.
    pub fn resolve_caps(
        &self,
        profile: &LanguageProfile,
        wall_ms: Option<u64>,
        memory_mb: Option<u64>,
    ) -> (u64, u64) {
        let wall = wall_ms
            .unwrap_or(profile.default_wall_ms)
            .clamp(1, self.config.max_wall_ms);
        let memory = memory_mb
            .unwrap_or(profile.default_memory_mb)
            .clamp(1, self.config.max_memory_mb);
        (wall, memory)
    }

    #[instrument(skip(self, request), fields(language = request.language))]
    pub async fn execute(&self, request: ExecRequest<'_>) -> Result<ExecResult> {
        let profile = languages::lookup(request.language)?;
        let (wall_ms, memory_mb) = self.resolve_caps(profile, request.wall_ms, request.memory_mb);

        // Removed on drop, which also covers a cancelled future.
        let workspace = self.prepare_workspace(profile, request.code).await?;

        if let Some(compile) = profile.compile_command() {
            let outcome = self
                .invoke(&RunRequest {
                    image: profile.image,
                    workspace: workspace.path(),
                    command: &compile,
                    stdin: b"",
                    wall_ms: self.config.compile_wall_ms,
                    memory_mb: self.config.compile_memory_mb,
                    writable: true,
                    env: profile.env,
                })
                .await;
            match outcome {
                None => return Ok(ExecResult::sandbox_failure(wall_ms)),
                Some(outcome) if !outcome.class.is_ok() => {
                    debug!(class = %outcome.class, "Compile phase failed");
                    return Ok(compile_failure(outcome, wall_ms));
                }
                Some(_) => {}
            }
        }

        let run = profile.run_command();
        let outcome = self
            .invoke(&RunRequest {
                image: profile.image,
                workspace: workspace.path(),
                command: &run,
                stdin: request.stdin.as_bytes(),
                wall_ms,
                memory_mb,
                writable: false,
                env: profile.env,
            })
            .await;

        Ok(match outcome {
            Some(outcome) => ExecResult::from_outcome(outcome, wall_ms),
            None => ExecResult::sandbox_failure(wall_ms),
        })
    }

    async fn invoke(&self, request: &RunRequest<'_>) -> Option<Outcome> {
        match self.runner.run(request).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                error!(error = %err, image = request.image, "Sandbox failure");
                None
            }
        }
    }

    async fn prepare_workspace(&self, profile: &LanguageProfile, code: &str) -> Result<TempDir> {
        tokio::fs::create_dir_all(&self.config.workspace_root).await?;
        let workspace = tempfile::Builder::new()
            .prefix("exec-")
            .tempdir_in(&self.config.workspace_root)?;
        // The sandbox user is unprivileged and must be able to write compile artifacts.
        set_mode(workspace.path(), 0o777).await?;

        let source = workspace.path().join(profile.source_file());
        tokio::fs::write(&source, code).await?;
        set_mode(&source, 0o644).await?;
        Ok(workspace)
    }
}

/// A failed compile keeps its diagnostics and names the cap it hit.
fn compile_failure(outcome: Outcome, wall_limit_ms: u64) -> ExecResult {
    let mut stderr = if outcome.stderr.trim().is_empty() {
        outcome.stdout
    } else {
        outcome.stderr
    };
    match outcome.class {
        ExecClass::TimeLimit => stderr.push_str("\ncompilation exceeded the time limit"),
        ExecClass::MemoryLimit => stderr.push_str("\ncompilation exceeded the memory limit"),
        _ => {}
    }
    ExecResult {
        stdout: String::new(),
        stderr,
        class: ExecClass::CompileError,
        wall_ms: outcome.wall_ms,
        memory_kb: outcome.memory_kb,
        exit_code: outcome.exit_code,
        wall_limit_ms,
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
