//! Value-level transition reducer.
//!
//! The reducer takes the observed state of one resource (its current
//! remote value, if any, and whatever is already staged) plus a user
//! intent, and returns the new staged state. It takes the state by value
//! and returns a new one; nothing is mutated in place.

use serde::{Deserialize, Serialize};
use suve_types::DeleteOptions;

/// A user-authored draft: the value to write, with an optional description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Draft {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: None,
        }
    }

    pub fn with_description(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: Some(description.into()),
        }
    }
}

/// What is currently staged for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Staged {
    /// Nothing pending.
    NotStaged,
    /// A create of a resource the remote does not have.
    Create(Draft),
    /// An update of an existing remote resource.
    Update(Draft),
    /// A delete of an existing remote resource.
    Delete(Option<DeleteOptions>),
}

impl Staged {
    pub fn is_staged(&self) -> bool {
        !matches!(self, Staged::NotStaged)
    }
}

/// The reducer's input: one resource as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryState {
    /// The remote's current value, `None` when the resource does not exist.
    pub current_value: Option<String>,
    pub staged: Staged,
}

impl EntryState {
    /// A resource with nothing staged.
    pub fn not_staged(current_value: Option<String>) -> Self {
        Self {
            current_value,
            staged: Staged::NotStaged,
        }
    }
}

/// A user intent against one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Stage the creation of a resource that must not exist yet.
    Add(Draft),
    /// Stage a new value for the resource (create or update).
    Edit(Draft),
    /// Stage the deletion of the resource.
    Delete(Option<DeleteOptions>),
    /// Drop whatever is staged, keeping any pending tag record.
    Reset,
}

/// The reducer's output: the new staged state, plus whether the pending
/// tag record for the resource must be discarded alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub staged: Staged,
    pub discard_tags: bool,
}

impl Reduction {
    fn keep_tags(staged: Staged) -> Self {
        Self {
            staged,
            discard_tags: false,
        }
    }
}

/// Typed rejections from the reducers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReduceError {
    #[error("resource not found")]
    NotFound,

    #[error("resource already exists; use edit to change it")]
    AlreadyExists,

    #[error("an update is already staged; use edit instead of add")]
    AddToUpdate,

    #[error("a delete is already staged; unstage it before adding")]
    AddToDelete,

    #[error("a delete is already staged; unstage it before editing")]
    EditDelete,

    #[error("pending tag changes exist; unstage them before deleting")]
    DeleteTagged,

    #[error("a delete is already staged; cannot stage tag changes")]
    TagDelete,

    #[error("a delete is already staged; cannot stage untag changes")]
    UntagDelete,

    #[error("cannot tag a resource that does not exist and is not being created")]
    TagNotFound,

    #[error("cannot untag a resource that does not exist and is not being created")]
    UntagNotFound,
}

/// Applies an intent to one resource's observed state.
///
/// Implements the full transition table. `Reset` always returns to
/// `NotStaged` but preserves the tag record; deleting a pending create
/// also discards tags, because the resource never existed remotely.
/// Editing a draft back to the remote's current value auto-unstages it:
/// if the user's draft equals the remote, no pending change is recorded.
pub fn reduce_entry(state: EntryState, intent: Intent) -> Result<Reduction, ReduceError> {
    let EntryState {
        current_value,
        staged,
    } = state;

    // Reset is uniform across every staged state.
    if matches!(intent, Intent::Reset) {
        return Ok(Reduction::keep_tags(Staged::NotStaged));
    }

    match staged {
        Staged::NotStaged => match intent {
            Intent::Add(draft) => {
                if current_value.is_some() {
                    return Err(ReduceError::AlreadyExists);
                }
                Ok(Reduction::keep_tags(Staged::Create(draft)))
            }
            Intent::Edit(draft) => {
                // Edit-to-current is a no-op: nothing gets staged.
                if current_value.as_deref() == Some(draft.value.as_str()) {
                    return Ok(Reduction::keep_tags(Staged::NotStaged));
                }
                Ok(Reduction::keep_tags(Staged::Update(draft)))
            }
            Intent::Delete(options) => {
                if current_value.is_none() {
                    return Err(ReduceError::NotFound);
                }
                Ok(Reduction::keep_tags(Staged::Delete(options)))
            }
            Intent::Reset => unreachable!("handled above"),
        },

        Staged::Create(_) => match intent {
            // Both Add and Edit overwrite the pending draft.
            Intent::Add(draft) | Intent::Edit(draft) => {
                Ok(Reduction::keep_tags(Staged::Create(draft)))
            }
            // The resource never existed: cancel the create and take any
            // pending tag record down with it.
            Intent::Delete(_) => Ok(Reduction {
                staged: Staged::NotStaged,
                discard_tags: true,
            }),
            Intent::Reset => unreachable!("handled above"),
        },

        Staged::Update(_) => match intent {
            Intent::Add(_) => Err(ReduceError::AddToUpdate),
            Intent::Edit(draft) => {
                // Draft matches the remote again: auto-unstage.
                if current_value.as_deref() == Some(draft.value.as_str()) {
                    return Ok(Reduction::keep_tags(Staged::NotStaged));
                }
                Ok(Reduction::keep_tags(Staged::Update(draft)))
            }
            Intent::Delete(options) => Ok(Reduction::keep_tags(Staged::Delete(options))),
            Intent::Reset => unreachable!("handled above"),
        },

        Staged::Delete(options) => match intent {
            Intent::Add(_) => Err(ReduceError::AddToDelete),
            Intent::Edit(_) => Err(ReduceError::EditDelete),
            // Idempotent: a second delete changes nothing.
            Intent::Delete(_) => Ok(Reduction::keep_tags(Staged::Delete(options))),
            Intent::Reset => unreachable!("handled above"),
        },
    }
}
