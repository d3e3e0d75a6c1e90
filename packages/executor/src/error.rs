use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Workspace error: {0}")]
    Workspace(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
