//! # suve-config: Path layout and process-wide configuration
//!
//! Locates the on-disk state tree (`~/.suve/...`), the agent's socket and
//! lock files, and the environment flags that govern daemon behavior.
//! Nothing here performs I/O beyond directory creation.

mod env;
mod error;
mod paths;

pub use env::{DAEMON_AUTO_START_ENV, auto_start_enabled};
pub use error::ConfigError;
pub use paths::{StateTree, agent_lock_path, create_private_dir, socket_dir, socket_path};
