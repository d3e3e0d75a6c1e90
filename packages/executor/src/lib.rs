//! Sandboxed compile-and-run of untrusted programs.

pub mod config;
pub mod error;
pub mod executor;
pub mod languages;
pub mod sandbox;

pub use config::SandboxConfig;
pub use error::{ExecutorError, Result};
pub use executor::{ExecRequest, ExecResult, Executor};
pub use languages::LanguageProfile;
pub use sandbox::{Outcome, RunRequest, SandboxError, SandboxRunner};
