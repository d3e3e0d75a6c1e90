pub mod docker;
pub mod error;
pub mod isolate;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use common::ExecClass;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::{SandboxBackend, SandboxConfig};
pub use docker::DockerSandbox;
pub use error::SandboxError;
pub use isolate::IsolateSandbox;

/// Mount point of the workspace inside every sandbox.
pub const WORKSPACE_MOUNT: &str = "/workspace";

/// One program invocation.
///
/// `command` is a shell command line evaluated with `/bin/sh -c` inside the
/// sandbox, with [`WORKSPACE_MOUNT`] as working directory.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    pub image: &'a str,
    pub workspace: &'a Path,
    pub command: &'a str,
    pub stdin: &'a [u8],
    pub wall_ms: u64,
    pub memory_mb: u64,
    /// Compile steps need to write artifacts next to the source.
    pub writable: bool,
    pub env: &'a [(&'a str, &'a str)],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the program was killed before it could exit.
    pub exit_code: Option<i32>,
    pub wall_ms: u64,
    /// Peak memory as reported by the supervisor, if it reports one.
    pub memory_kb: Option<u64>,
    pub class: ExecClass,
}

/// Executes one program in an isolated environment.
///
/// Implementations arm the deadline before launch, never trust the
/// program's own report of how it ended, and tear the sandbox down before
/// returning or when the returned future is dropped.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(&self, request: &RunRequest<'_>) -> Result<Outcome, SandboxError>;
}

/// Verdict derived from what the supervisor observed.
pub fn classify(oom_killed: bool, timed_out: bool, exit_code: Option<i32>) -> ExecClass {
    if oom_killed {
        ExecClass::MemoryLimit
    } else if timed_out {
        ExecClass::TimeLimit
    } else if exit_code == Some(0) {
        ExecClass::Ok
    } else {
        ExecClass::RuntimeError
    }
}

pub fn build_runner(config: &SandboxConfig) -> Arc<dyn SandboxRunner> {
    match config.backend {
        SandboxBackend::Docker => Arc::new(DockerSandbox::new(
            config.docker.clone(),
            config.max_output_bytes,
        )),
        SandboxBackend::Isolate => Arc::new(IsolateSandbox::new(
            config.isolate.clone(),
            config.max_output_bytes,
        )),
    }
}

/// Reads a stream to EOF, keeping at most `cap` bytes. The rest is drained
/// so the writer never blocks on a full pipe.
pub(crate) async fn read_capped<R>(mut reader: R, cap: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(kept.len());
                if room < n {
                    truncated = true;
                }
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    let mut text = String::from_utf8_lossy(&kept).into_owned();
    if truncated {
        text.push_str("\n[output truncated]");
    }
    text
}
