use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse outcome of a single program execution.
///
/// Produced by the sandbox for every invocation and folded by the executor
/// when a compile phase precedes the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ExecClass {
    /// Exited with status 0 within every limit.
    Ok,
    /// Exited non-zero (or by signal) within limits.
    RuntimeError,
    /// Wall-clock deadline fired before the program exited.
    TimeLimit,
    /// Supervisor reported an out-of-memory kill.
    MemoryLimit,
    /// The compile step did not finish cleanly.
    CompileError,
    /// The sandbox itself could not be launched or supervised.
    SandboxError,
}

impl ExecClass {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::RuntimeError => "runtimeError",
            Self::TimeLimit => "timeLimit",
            Self::MemoryLimit => "memoryLimit",
            Self::CompileError => "compileError",
            Self::SandboxError => "sandboxError",
        }
    }

    /// Status string exposed in HTTP responses.
    ///
    /// Compile, runtime and sandbox failures all collapse to `"error"`.
    pub fn response_status(&self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::TimeLimit => "timeout",
            Self::MemoryLimit => "memory",
            Self::RuntimeError | Self::CompileError | Self::SandboxError => "error",
        }
    }

    /// Short, class-tagged message attached to a failed test case.
    pub fn failure_message(&self) -> Option<&'static str> {
        match self {
            Self::Ok => None,
            Self::RuntimeError => Some("runtime error: program exited abnormally"),
            Self::TimeLimit => Some("time limit exceeded"),
            Self::MemoryLimit => Some("memory limit exceeded"),
            Self::CompileError => Some("compile error"),
            Self::SandboxError => Some("internal sandbox error"),
        }
    }
}

impl fmt::Display for ExecClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
