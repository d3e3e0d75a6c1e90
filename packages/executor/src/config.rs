use serde::Deserialize;
use std::path::PathBuf;

/// Which supervisor runs untrusted programs.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SandboxBackend {
    #[default]
    Docker,
    Isolate,
}

/// Docker CLI settings. Each invocation gets a fresh, uniquely named container.
#[derive(Debug, Deserialize, Clone)]
pub struct DockerConfig {
    /// Docker executable path. Default: "docker".
    #[serde(default = "default_docker_bin")]
    pub bin: String,
    /// CPU quota passed to `--cpus`. Default: 0.5.
    #[serde(default = "default_cpus")]
    pub cpus: f64,
    /// Maximum processes inside the container. Default: 64.
    #[serde(default = "default_pids_limit")]
    pub pids_limit: u32,
    /// Extra wall time granted for container start-up before the deadline fires.
    /// Default: 1500 ms.
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,
    /// Size of the writable `/tmp` tmpfs. Default: 64 MB.
    #[serde(default = "default_tmpfs_size_mb")]
    pub tmpfs_size_mb: u64,
    /// `--user` for the program. Default: "65534:65534" (nobody).
    #[serde(default = "default_docker_user")]
    pub user: String,
}

fn default_docker_bin() -> String {
    "docker".into()
}
fn default_cpus() -> f64 {
    0.5
}
fn default_pids_limit() -> u32 {
    64
}
fn default_startup_grace_ms() -> u64 {
    1_500
}
fn default_tmpfs_size_mb() -> u64 {
    64
}
fn default_docker_user() -> String {
    "65534:65534".into()
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            bin: default_docker_bin(),
            cpus: default_cpus(),
            pids_limit: default_pids_limit(),
            startup_grace_ms: default_startup_grace_ms(),
            tmpfs_size_mb: default_tmpfs_size_mb(),
            user: default_docker_user(),
        }
    }
}

/// isolate(1) settings. Requires a cgroup-enabled isolate installation.
#[derive(Debug, Deserialize, Clone)]
pub struct IsolateConfig {
    /// Isolate executable path. Default: "isolate".
    #[serde(default = "default_isolate_bin")]
    pub bin: String,
    /// Number of isolate boxes; runs beyond this wait for a free box. Default: 64.
    #[serde(default = "default_box_pool")]
    pub box_pool: u32,
    /// Maximum processes inside a box. Default: 64.
    #[serde(default = "default_process_limit")]
    pub process_limit: u32,
    /// Grace period before isolate kills a program past its time limit. Default: 0.5 s.
    #[serde(default = "default_extra_time_secs")]
    pub extra_time_secs: f64,
}

fn default_isolate_bin() -> String {
    "isolate".into()
}
fn default_box_pool() -> u32 {
    64
}
fn default_process_limit() -> u32 {
    64
}
fn default_extra_time_secs() -> f64 {
    0.5
}

impl Default for IsolateConfig {
    fn default() -> Self {
        Self {
            bin: default_isolate_bin(),
            box_pool: default_box_pool(),
            process_limit: default_process_limit(),
            extra_time_secs: default_extra_time_secs(),
        }
    }
}

/// Sandbox and executor configuration, embedded in the server config under `sandbox`.
#[derive(Debug, Deserialize, Clone)]
pub struct SandboxConfig {
    #[serde(default)]
    pub backend: SandboxBackend,
    /// Parent directory of per-execution workspaces. Default: system temp dir.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Wall-time cap for the compile phase. Default: 10000 ms.
    #[serde(default = "default_compile_wall_ms")]
    pub compile_wall_ms: u64,
    /// Memory cap for the compile phase. Default: 512 MB.
    #[serde(default = "default_compile_memory_mb")]
    pub compile_memory_mb: u64,
    /// Upper bound for caller-supplied wall time. Default: 30000 ms.
    #[serde(default = "default_max_wall_ms")]
    pub max_wall_ms: u64,
    /// Upper bound for caller-supplied memory. Default: 1024 MB.
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,
    /// Per-stream capture limit for stdout and stderr. Default: 64 KiB.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub isolate: IsolateConfig,
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("judge-workspaces")
}
fn default_compile_wall_ms() -> u64 {
    10_000
}
fn default_compile_memory_mb() -> u64 {
    512
}
fn default_max_wall_ms() -> u64 {
    30_000
}
fn default_max_memory_mb() -> u64 {
    1_024
}
fn default_max_output_bytes() -> usize {
    64 * 1024
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: SandboxBackend::default(),
            workspace_root: default_workspace_root(),
            compile_wall_ms: default_compile_wall_ms(),
            compile_memory_mb: default_compile_memory_mb(),
            max_wall_ms: default_max_wall_ms(),
            max_memory_mb: default_max_memory_mb(),
            max_output_bytes: default_max_output_bytes(),
            docker: DockerConfig::default(),
            isolate: IsolateConfig::default(),
        }
    }
}
