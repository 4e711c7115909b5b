//! # suve-agent: The suve agent daemon
//!
//! A long-running local process, one per user, that owns staged state in
//! memory. Clients reach it over a unix socket with the protocol defined
//! in `suve-wire`; each request carries its (account, region,
//! service-or-all) scope.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                      suve-agent                       │
//! │  ┌──────────┐   ┌──────────────┐   ┌───────────────┐  │
//! │  │ Listener │ → │ Frame decode │ → │    Handler    │  │
//! │  │ (unix)   │   │ (suve-wire)  │   │ (→ Registry)  │  │
//! │  └──────────┘   └──────────────┘   └───────────────┘  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Every verb is a memory operation and finishes in microseconds, so the
//! server handles connections serially: all verbs are linearized without
//! any further locking. When a successful unstage leaves every namespace
//! empty, the daemon replies, prints a one-line exit message keyed by the
//! request's hint, and exits — unless manual mode
//! (`SUVE_DAEMON_AUTO_START=0`) is in effect.

mod error;
mod handler;
mod registry;
mod server;

pub use error::{AgentError, AgentResult};
pub use handler::Handler;
pub use registry::Registry;
pub use server::{Server, ServerConfig, Shutdown};
