//! # suve-store: Backend facade and file backend
//!
//! The rest of the engine programs against two narrow interfaces —
//! [`ServiceStore`] for one service's pending set and [`GlobalStore`] for
//! fan-out across both — independent of where the state actually lives.
//! This crate provides the traits plus the file-backed implementation;
//! the agent-backed implementation lives in `suve-client`.
//!
//! ## File backend contracts
//!
//! - One file per (account, region, service):
//!   `~/.suve/<account>/<region>/<service>/stage.json`
//! - Every mutating operation holds the process-wide mutex and an
//!   exclusive OS file lock on `stage.json.lock` for the whole
//!   read–modify–write sequence
//! - An empty state is represented by the absence of the file
//! - Files with the codec's magic prefix are decrypted with the
//!   configured passphrase, and refused without one

mod facade;
mod file;

pub use facade::{GlobalStore, ServiceStore};
pub use file::FileStore;

use std::path::PathBuf;

/// Failures surfaced by any backend behind the facade.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to acquire lock on {path}: {source}")]
    LockFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("decryption failed: wrong or missing passphrase")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error(transparent)]
    State(#[from] suve_types::TypesError),

    #[error("nothing staged for '{name}'")]
    NotStaged { name: String },

    #[error("agent daemon is not running and auto-start is disabled")]
    DaemonUnavailable,

    #[error("agent error: {0}")]
    Agent(String),

    #[error("operation canceled")]
    Canceled,
}
