//! Tag-set transition reducer.
//!
//! A pending tag change is stored as disjoint (add, remove) sets, not as
//! the full desired tag set. This preserves user intent under intervening
//! remote changes: "add env=prod" means "ensure env=prod", not "env is the
//! only tag". When the remote's current tags are known, changes that the
//! remote already satisfies are skipped instead of recorded.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::reduce::{EntryState, ReduceError, Staged};

/// The pending (add, remove) pair for one resource.
///
/// Invariant: `add` keys and `remove` keys are disjoint; the reducer
/// maintains this by canceling whichever side an action contradicts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSets {
    pub add: BTreeMap<String, String>,
    pub remove: BTreeSet<String>,
}

impl TagSets {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// A user intent against one resource's tag set.
///
/// `current_*` carries the remote's tags as observed when the action was
/// issued; `None` means the remote was not consulted, which disables
/// auto-skip (the change is recorded unconditionally).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAction {
    Tag {
        tags: BTreeMap<String, String>,
        current_tags: Option<BTreeMap<String, String>>,
    },
    Untag {
        keys: BTreeSet<String>,
        current_keys: Option<BTreeSet<String>>,
    },
}

/// Applies a tag action to one resource's pending tag sets.
///
/// Returns `Ok(None)` when the resulting record describes no change at
/// all — the caller removes the record entirely rather than storing an
/// empty one.
pub fn reduce_tags(
    entry: &EntryState,
    pending: TagSets,
    action: TagAction,
) -> Result<Option<TagSets>, ReduceError> {
    // A resource headed for deletion takes no tag changes.
    if matches!(entry.staged, Staged::Delete(_)) {
        return Err(match action {
            TagAction::Tag { .. } => ReduceError::TagDelete,
            TagAction::Untag { .. } => ReduceError::UntagDelete,
        });
    }

    // Nothing to attach tags to: the resource neither exists remotely nor
    // is being created.
    if entry.current_value.is_none() && !entry.staged.is_staged() {
        return Err(match action {
            TagAction::Tag { .. } => ReduceError::TagNotFound,
            TagAction::Untag { .. } => ReduceError::UntagNotFound,
        });
    }

    let mut pending = pending;
    match action {
        TagAction::Tag { tags, current_tags } => {
            for (key, value) in tags {
                // Setting a key cancels any pending removal of it.
                pending.remove.remove(&key);
                let already_set =
                    current_tags.as_ref().is_some_and(|cur| cur.get(&key) == Some(&value));
                if already_set {
                    // The remote already has this exact pair: skip it, and
                    // drop any stale pending add.
                    pending.add.remove(&key);
                } else {
                    pending.add.insert(key, value);
                }
            }
        }
        TagAction::Untag { keys, current_keys } => {
            for key in keys {
                // Removing a key cancels any pending add of it.
                pending.add.remove(&key);
                let already_absent =
                    current_keys.as_ref().is_some_and(|cur| !cur.contains(&key));
                if already_absent {
                    pending.remove.remove(&key);
                } else {
                    pending.remove.insert(key);
                }
            }
        }
    }

    if pending.is_empty() {
        Ok(None)
    } else {
        Ok(Some(pending))
    }
}
