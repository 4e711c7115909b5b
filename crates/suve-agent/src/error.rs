//! Agent daemon error types.

use std::path::PathBuf;

use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("another agent is already running (lock held on {0})")]
    AlreadyRunning(PathBuf),

    #[error("failed to bind socket at {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] suve_config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] suve_wire::WireError),
}
