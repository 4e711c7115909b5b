//! Staging glue: user intents through the pure reducers into a backend.
//!
//! The reducers in `suve-kernel` know nothing about clocks or storage.
//! This module assembles their input from the store and the caller's view
//! of the remote, stamps `staged_at` / `base_modified_at` on the way out,
//! and persists the outcome. It also enforces the delete/tag exclusion in
//! both orderings: tagging a pending delete is rejected by the tag
//! reducer, and deleting a resource with pending tag changes is rejected
//! here.

use suve_kernel::{
    Draft, EntryState, Intent, ReduceError, Staged, TagAction, TagSets, reduce_entry, reduce_tags,
};
use suve_store::{ServiceStore, StoreError};
use suve_types::{Entry, Operation, Service, TagEntry, Timestamp};

use crate::SuveError;

/// The caller's observation of one remote resource, taken just before
/// staging. `modified_at` becomes the draft's base generation.
#[derive(Debug, Clone, Default)]
pub struct RemoteView {
    pub current_value: Option<String>,
    pub modified_at: Option<Timestamp>,
}

impl RemoteView {
    /// The resource does not exist remotely.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn existing(value: impl Into<String>, modified_at: Option<Timestamp>) -> Self {
        Self {
            current_value: Some(value.into()),
            modified_at,
        }
    }
}

/// What a staging call left behind for the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// A pending change is now staged (new or replaced).
    Staged,
    /// No pending change remains: the intent canceled out or was a no-op.
    NothingPending,
}

/// Runs a value-level intent against one resource.
///
/// The auto-skip convenience comes through the reducer: editing a draft
/// back to the remote's current value leaves nothing staged.
pub fn stage_intent(
    store: &dyn ServiceStore,
    name: &str,
    remote: &RemoteView,
    intent: Intent,
    now: Timestamp,
) -> Result<StageOutcome, SuveError> {
    let previous = store.get_entry(name)?;
    let entry_state = EntryState {
        current_value: remote.current_value.clone(),
        staged: previous.as_ref().map_or(Staged::NotStaged, staged_of),
    };

    // Deleting a name that carries pending tag changes is rejected, with
    // one exception: canceling a pending create discards them instead.
    if matches!(intent, Intent::Delete(_))
        && !matches!(entry_state.staged, Staged::Create(_))
        && store.get_tag(name)?.is_some()
    {
        return Err(ReduceError::DeleteTagged.into());
    }

    let reduction = reduce_entry(entry_state, intent)?;

    if reduction.discard_tags {
        match store.unstage_tag(name, None) {
            Ok(()) | Err(StoreError::NotStaged { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    match reduction.staged {
        Staged::NotStaged => {
            if previous.is_some() {
                store.unstage_entry(name, None)?;
            }
            Ok(StageOutcome::NothingPending)
        }
        staged => {
            let entry = entry_of(&staged, previous.as_ref(), remote, now);
            store.stage_entry(name, entry)?;
            Ok(StageOutcome::Staged)
        }
    }
}

/// Runs a tag action against one resource.
///
/// For a secret with a pending create, the tag change folds into the
/// create entry itself (the tag set is attached atomically at create
/// time); everywhere else it lands in a separate tag record.
pub fn stage_tags(
    store: &dyn ServiceStore,
    name: &str,
    remote: &RemoteView,
    action: TagAction,
    now: Timestamp,
) -> Result<StageOutcome, SuveError> {
    let previous_entry = store.get_entry(name)?;
    let entry_state = EntryState {
        current_value: remote.current_value.clone(),
        staged: previous_entry.as_ref().map_or(Staged::NotStaged, staged_of),
    };

    if store.service() == Service::Secret {
        if let Some(entry) = &previous_entry {
            if entry.operation == Operation::Create {
                return fold_into_create(store, name, entry, &entry_state, action);
            }
        }
    }

    let previous_tag = store.get_tag(name)?;
    let pending = previous_tag
        .as_ref()
        .map(|t| TagSets {
            add: t.add.clone(),
            remove: t.remove.clone(),
        })
        .unwrap_or_default();

    match reduce_tags(&entry_state, pending, action)? {
        None => {
            if previous_tag.is_some() {
                store.unstage_tag(name, None)?;
            }
            Ok(StageOutcome::NothingPending)
        }
        Some(sets) => {
            store.stage_tag(
                name,
                TagEntry {
                    add: sets.add,
                    remove: sets.remove,
                    staged_at: now,
                    base_modified_at: remote.modified_at,
                },
            )?;
            Ok(StageOutcome::Staged)
        }
    }
}

/// Updates the tag snapshot carried by a pending secret create.
fn fold_into_create(
    store: &dyn ServiceStore,
    name: &str,
    entry: &Entry,
    entry_state: &EntryState,
    action: TagAction,
) -> Result<StageOutcome, SuveError> {
    let pending = TagSets {
        add: entry.tags_snapshot.clone().unwrap_or_default(),
        remove: entry.untag_keys_snapshot.clone().unwrap_or_default(),
    };
    let next = reduce_tags(entry_state, pending, action)?;

    let mut entry = entry.clone();
    let outcome = match next {
        None => {
            entry.tags_snapshot = None;
            entry.untag_keys_snapshot = None;
            StageOutcome::NothingPending
        }
        Some(sets) => {
            entry.tags_snapshot = (!sets.add.is_empty()).then_some(sets.add);
            entry.untag_keys_snapshot = (!sets.remove.is_empty()).then_some(sets.remove);
            StageOutcome::Staged
        }
    };
    store.stage_entry(name, entry)?;
    Ok(outcome)
}

fn staged_of(entry: &Entry) -> Staged {
    let draft = || Draft {
        value: entry.value.clone().unwrap_or_default(),
        description: entry.description.clone(),
    };
    match entry.operation {
        Operation::Create => Staged::Create(draft()),
        Operation::Update => Staged::Update(draft()),
        Operation::Delete => Staged::Delete(entry.delete_options),
    }
}

fn entry_of(
    staged: &Staged,
    previous: Option<&Entry>,
    remote: &RemoteView,
    now: Timestamp,
) -> Entry {
    match staged {
        Staged::Create(draft) => {
            let mut entry = Entry::create(draft.value.clone(), draft.description.clone(), now);
            // A replaced create keeps the tag snapshot it accumulated.
            if let Some(prev) = previous {
                if prev.operation == Operation::Create {
                    entry.tags_snapshot = prev.tags_snapshot.clone();
                    entry.untag_keys_snapshot = prev.untag_keys_snapshot.clone();
                }
            }
            entry
        }
        Staged::Update(draft) => Entry::update(
            draft.value.clone(),
            draft.description.clone(),
            now,
            remote.modified_at,
        ),
        Staged::Delete(options) => Entry::delete(*options, now, remote.modified_at),
        Staged::NotStaged => unreachable!("NotStaged never persists"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use suve_config::StateTree;
    use suve_store::FileStore;
    use tempfile::TempDir;

    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn now() -> Timestamp {
        ts("2024-03-01T10:00:00Z")
    }

    fn param_store(temp: &TempDir) -> impl ServiceStore {
        FileStore::new(StateTree::with_root(temp.path()), "a", "r").scoped(Service::Param)
    }

    fn secret_store(temp: &TempDir) -> impl ServiceStore {
        FileStore::new(StateTree::with_root(temp.path()), "a", "r").scoped(Service::Secret)
    }

    fn tag_action(pairs: &[(&str, &str)]) -> TagAction {
        TagAction::Tag {
            tags: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            current_tags: None,
        }
    }

    #[test]
    fn add_stages_a_create_with_no_base() {
        let temp = TempDir::new().unwrap();
        let store = param_store(&temp);
        let outcome = stage_intent(
            &store,
            "/a",
            &RemoteView::missing(),
            Intent::Add(Draft::new("v1")),
            now(),
        )
        .unwrap();
        assert_eq!(outcome, StageOutcome::Staged);

        let entry = store.get_entry("/a").unwrap().unwrap();
        assert_eq!(entry.operation, Operation::Create);
        assert_eq!(entry.base_modified_at, None);
    }

    #[test]
    fn edit_stamps_the_observed_base() {
        let temp = TempDir::new().unwrap();
        let store = param_store(&temp);
        let remote = RemoteView::existing("v1", Some(ts("2024-01-01T12:00:00Z")));
        stage_intent(&store, "/a", &remote, Intent::Edit(Draft::new("v2")), now()).unwrap();

        let entry = store.get_entry("/a").unwrap().unwrap();
        assert_eq!(entry.operation, Operation::Update);
        assert_eq!(entry.base_modified_at, Some(ts("2024-01-01T12:00:00Z")));
    }

    #[test]
    fn edit_back_to_remote_value_empties_the_staged_set() {
        let temp = TempDir::new().unwrap();
        let store = param_store(&temp);
        let remote = RemoteView::existing("v1", Some(ts("2024-01-01T12:00:00Z")));

        stage_intent(&store, "/a", &remote, Intent::Edit(Draft::new("v2")), now()).unwrap();
        let outcome =
            stage_intent(&store, "/a", &remote, Intent::Edit(Draft::new("v1")), now()).unwrap();

        assert_eq!(outcome, StageOutcome::NothingPending);
        assert_eq!(store.get_entry("/a").unwrap(), None);
        assert!(store.list_entries().unwrap().is_empty());
    }

    #[test]
    fn delete_of_a_pending_create_discards_its_tags() {
        let temp = TempDir::new().unwrap();
        let store = param_store(&temp);
        let remote = RemoteView::missing();

        stage_intent(&store, "/a", &remote, Intent::Add(Draft::new("v1")), now()).unwrap();
        stage_tags(&store, "/a", &remote, tag_action(&[("env", "prod")]), now()).unwrap();
        assert!(store.get_tag("/a").unwrap().is_some());

        let outcome = stage_intent(&store, "/a", &remote, Intent::Delete(None), now()).unwrap();
        assert_eq!(outcome, StageOutcome::NothingPending);
        assert_eq!(store.get_entry("/a").unwrap(), None);
        assert_eq!(store.get_tag("/a").unwrap(), None);
    }

    #[test]
    fn delete_with_pending_tags_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = param_store(&temp);
        let remote = RemoteView::existing("v1", None);

        stage_tags(&store, "/a", &remote, tag_action(&[("env", "prod")]), now()).unwrap();
        let err = stage_intent(&store, "/a", &remote, Intent::Delete(None), now()).unwrap_err();
        assert!(matches!(
            err,
            SuveError::Reduce(ReduceError::DeleteTagged)
        ));
    }

    #[test]
    fn tagging_a_pending_delete_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = param_store(&temp);
        let remote = RemoteView::existing("v1", None);

        stage_intent(&store, "/a", &remote, Intent::Delete(None), now()).unwrap();
        let err =
            stage_tags(&store, "/a", &remote, tag_action(&[("env", "prod")]), now()).unwrap_err();
        assert!(matches!(err, SuveError::Reduce(ReduceError::TagDelete)));
    }

    #[test]
    fn tag_matching_remote_collapses_to_no_record() {
        let temp = TempDir::new().unwrap();
        let store = param_store(&temp);
        let remote = RemoteView::existing("v1", None);

        let action = TagAction::Tag {
            tags: [
                ("env".to_string(), "prod".to_string()),
                ("team".to_string(), "api".to_string()),
            ]
            .into(),
            current_tags: Some(BTreeMap::from([(
                "env".to_string(),
                "prod".to_string(),
            )])),
        };
        stage_tags(&store, "/a", &remote, action, now()).unwrap();

        let tag = store.get_tag("/a").unwrap().unwrap();
        assert_eq!(tag.add, BTreeMap::from([("team".to_string(), "api".to_string())]));
        assert!(tag.remove.is_empty());
    }

    #[test]
    fn reset_keeps_the_tag_record() {
        let temp = TempDir::new().unwrap();
        let store = param_store(&temp);
        let remote = RemoteView::existing("v1", None);

        stage_intent(&store, "/a", &remote, Intent::Edit(Draft::new("v2")), now()).unwrap();
        stage_tags(&store, "/a", &remote, tag_action(&[("env", "prod")]), now()).unwrap();

        let outcome = stage_intent(&store, "/a", &remote, Intent::Reset, now()).unwrap();
        assert_eq!(outcome, StageOutcome::NothingPending);
        assert_eq!(store.get_entry("/a").unwrap(), None);
        assert!(store.get_tag("/a").unwrap().is_some());
    }

    #[test]
    fn secret_create_accumulates_tags_in_its_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = secret_store(&temp);
        let remote = RemoteView::missing();

        stage_intent(&store, "api-key", &remote, Intent::Add(Draft::new("s1")), now()).unwrap();
        stage_tags(&store, "api-key", &remote, tag_action(&[("env", "prod")]), now()).unwrap();

        let entry = store.get_entry("api-key").unwrap().unwrap();
        assert_eq!(
            entry.tags_snapshot,
            Some(BTreeMap::from([("env".to_string(), "prod".to_string())]))
        );
        // No separate tag record: the snapshot rides on the create.
        assert_eq!(store.get_tag("api-key").unwrap(), None);
    }

    #[test]
    fn replacing_a_secret_create_keeps_its_tag_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = secret_store(&temp);
        let remote = RemoteView::missing();

        stage_intent(&store, "api-key", &remote, Intent::Add(Draft::new("s1")), now()).unwrap();
        stage_tags(&store, "api-key", &remote, tag_action(&[("env", "prod")]), now()).unwrap();
        stage_intent(&store, "api-key", &remote, Intent::Add(Draft::new("s2")), now()).unwrap();

        let entry = store.get_entry("api-key").unwrap().unwrap();
        assert_eq!(entry.value.as_deref(), Some("s2"));
        assert!(entry.tags_snapshot.is_some());
    }
}
