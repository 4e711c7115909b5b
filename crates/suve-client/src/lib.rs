//! # suve-client: Client side of the agent backend
//!
//! [`AgentClient`] speaks the `suve-wire` protocol to the agent daemon
//! over its unix socket, starting the daemon on demand unless manual mode
//! (`SUVE_DAEMON_AUTO_START=0`) is in effect. [`AgentStore`] layers the
//! backend facade from `suve-store` on top, so callers swap file and
//! agent backends freely.
//!
//! ## Lifecycle policy
//!
//! - Read verbs never start a daemon in manual mode; with no daemon
//!   running they report the empty state.
//! - Write verbs ensure the daemon is running: auto-start by default,
//!   a `DaemonUnavailable` error in manual mode.

mod client;
mod store;

pub use client::AgentClient;
pub use store::{AgentServiceStore, AgentStore};

/// Client-side failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("agent daemon is not running and auto-start is disabled")]
    DaemonUnavailable,

    #[error("failed to start the agent daemon: {0}")]
    SpawnFailed(std::io::Error),

    #[error("io error on agent socket: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] suve_wire::WireError),

    #[error("agent rejected the request: {message}")]
    Agent {
        code: suve_wire::ErrorCode,
        message: String,
    },

    #[error("unexpected response from agent: {0}")]
    Protocol(String),

    #[error(transparent)]
    Config(#[from] suve_config::ConfigError),
}
