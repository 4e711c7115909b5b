//! # suve-kernel: Functional core of suve
//!
//! The kernel is the pure, deterministic heart of the staging engine. It
//! decides how the staged state of one resource reacts to a user intent.
//! The same reducer runs behind the file backend and the agent daemon.
//!
//! ## Key Principles
//!
//! - **No IO**: the kernel never touches disk, network, or any backend
//! - **No clocks**: `staged_at`/`base_modified_at` stamping is the caller's job
//! - **Pure functions**: `reduce_entry(entry_state, intent) -> Result<Reduction, _>`
//!
//! ## Architecture
//!
//! - [`reduce`]: value-level transitions (`Add`, `Edit`, `Delete`, `Reset`)
//! - [`tags`]: tag-set transitions with auto-skip against the remote
//!
//! ## Example
//!
//! ```
//! use suve_kernel::{reduce_entry, Draft, EntryState, Intent, Staged};
//!
//! let state = EntryState::not_staged(None);
//! let reduction = reduce_entry(state, Intent::Add(Draft::new("v1"))).unwrap();
//! assert!(matches!(reduction.staged, Staged::Create(_)));
//! ```

pub mod reduce;
pub mod tags;


pub use reduce::{Draft, EntryState, Intent, Reduction, ReduceError, Staged, reduce_entry};
pub use tags::{TagAction, TagSets, reduce_tags};
