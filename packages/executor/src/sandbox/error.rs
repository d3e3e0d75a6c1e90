use thiserror::Error;

/// Failures of the sandbox itself, never of the program inside it.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Environment initialization failed: {0}")]
    Initialization(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("Supervisor report unreadable: {0}")]
    Report(String),
}
