//! The two interfaces the engine programs against.

use std::collections::BTreeMap;

use suve_types::{Entry, Hint, Service, State, TagEntry};

use crate::StoreError;

/// Operations restricted to one service's pending set.
///
/// Implemented by the file backend (this crate) and the agent backend
/// (`suve-client`); callers never know which one they hold.
pub trait ServiceStore: Send + Sync {
    /// The service this handle is scoped to.
    fn service(&self) -> Service;

    /// The pending value mutation for one resource, if any.
    fn get_entry(&self, name: &str) -> Result<Option<Entry>, StoreError>;

    /// The pending tag mutation for one resource, if any.
    fn get_tag(&self, name: &str) -> Result<Option<TagEntry>, StoreError>;

    fn list_entries(&self) -> Result<BTreeMap<String, Entry>, StoreError>;

    fn list_tags(&self) -> Result<BTreeMap<String, TagEntry>, StoreError>;

    /// Stages (or replaces) the pending value mutation for one resource.
    fn stage_entry(&self, name: &str, entry: Entry) -> Result<(), StoreError>;

    /// Stages (or replaces) the pending tag mutation for one resource.
    fn stage_tag(&self, name: &str, tag: TagEntry) -> Result<(), StoreError>;

    /// Removes the pending value mutation; fails with
    /// [`StoreError::NotStaged`] when there is none.
    fn unstage_entry(&self, name: &str, hint: Option<Hint>) -> Result<(), StoreError>;

    /// Removes the pending tag mutation; fails with
    /// [`StoreError::NotStaged`] when there is none.
    fn unstage_tag(&self, name: &str, hint: Option<Hint>) -> Result<(), StoreError>;

    /// Reads this service's whole pending set; with `keep = false` the
    /// source is cleared as part of the same critical section.
    fn drain(&self, keep: bool) -> Result<State, StoreError>;

    /// Replaces this service's pending set wholesale.
    fn write_state(&self, state: State) -> Result<(), StoreError>;
}

/// Fan-out operations across both services.
pub trait GlobalStore: Send + Sync {
    /// The whole pending set, both services combined.
    fn list(&self) -> Result<State, StoreError>;

    /// Drops every pending change. The hint only affects how the agent
    /// daemon words its exit message.
    fn unstage_all(&self, hint: Option<Hint>) -> Result<(), StoreError>;

    /// Reads everything; with `keep = false` the source is cleared.
    fn drain(&self, keep: bool) -> Result<State, StoreError>;

    /// Replaces the whole pending set, both services.
    fn write_state(&self, state: State) -> Result<(), StoreError>;
}
