//! # suve: A Git-like staging engine for cloud parameters and secrets
//!
//! Users stage create/update/delete and tag changes locally, inspect and
//! edit the pending set, detect drift against the remote authority, and
//! apply the batch per item. This crate ties the pieces together:
//!
//! - [`remote`]: the two capability contracts the engine consumes
//!   ([`remote::ParamOps`], [`remote::SecretOps`])
//! - [`staging`]: user intents run through the pure reducers and into a
//!   backend
//! - [`conflict`]: the parallel remote-timestamp probe
//! - [`apply`]: ordered dispatch of the staged set with per-item recovery
//! - [`resolve`]: version-selector resolution against the remote
//! - [`printer`]: status rendering of the staged set
//! - [`facade`]: binds a backend choice (file or agent) into store handles
//!
//! The data model lives in `suve-types`, the reducers in `suve-kernel`,
//! and the backends in `suve-store` / `suve-client`.

pub mod apply;
pub mod conflict;
pub mod facade;
pub mod printer;
pub mod remote;
pub mod resolve;
pub mod staging;

pub use suve_kernel::{Draft, Intent, ReduceError, TagAction};
pub use suve_store::{GlobalStore, ServiceStore, StoreError};
pub use suve_types::{
    Cancel, DeleteOptions, Entry, Hint, Operation, Service, State, TagEntry, Timestamp,
};

/// Engine-level failures.
#[derive(Debug, thiserror::Error)]
pub enum SuveError {
    #[error(transparent)]
    Store(#[from] suve_store::StoreError),

    #[error(transparent)]
    Reduce(#[from] suve_kernel::ReduceError),

    #[error(transparent)]
    Remote(#[from] remote::RemoteError),

    #[error(transparent)]
    Types(#[from] suve_types::TypesError),

    #[error(transparent)]
    Config(#[from] suve_config::ConfigError),

    #[error("operation canceled")]
    Canceled,
}
