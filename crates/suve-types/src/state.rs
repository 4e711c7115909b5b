//! The whole pending set: everything staged and not yet applied.
//!
//! A [`State`] is owned by exactly one backend at a time (a file handle or
//! an agent session). The maps are keyed service-first so the two resource
//! families never cross-contaminate. No behavior here depends on iteration
//! order; `BTreeMap` gives a stable order for free at print time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Entry, Service, TagEntry, TypesError};

/// Current on-disk format version. Version-1 files (written before pending
/// tag records existed) migrate on load by filling the missing map.
pub const STATE_VERSION: u32 = 2;

/// The entire pending set for one (account, region) namespace.
///
/// The two inner maps are independent: a resource may have an [`Entry`],
/// a [`TagEntry`], both, or neither. An empty `State` is represented on
/// disk by the absence of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub version: u32,
    #[serde(default)]
    pub entries: BTreeMap<Service, BTreeMap<String, Entry>>,
    #[serde(default)]
    pub tags: BTreeMap<Service, BTreeMap<String, TagEntry>>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// Creates an empty state at the current format version.
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            entries: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    /// True when nothing at all is staged.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(BTreeMap::is_empty)
            && self.tags.values().all(BTreeMap::is_empty)
    }

    /// Number of pending value mutations across both services.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Number of pending tag mutations across both services.
    pub fn tag_count(&self) -> usize {
        self.tags.values().map(BTreeMap::len).sum()
    }

    /// Looks up the pending value mutation for one resource.
    pub fn entry(&self, service: Service, name: &str) -> Option<&Entry> {
        self.entries.get(&service).and_then(|m| m.get(name))
    }

    /// Looks up the pending tag mutation for one resource.
    pub fn tag(&self, service: Service, name: &str) -> Option<&TagEntry> {
        self.tags.get(&service).and_then(|m| m.get(name))
    }

    /// Stages (or replaces) the pending value mutation for one resource.
    pub fn set_entry(&mut self, service: Service, name: impl Into<String>, entry: Entry) {
        self.entries.entry(service).or_default().insert(name.into(), entry);
    }

    /// Stages (or replaces) the pending tag mutation for one resource.
    pub fn set_tag(&mut self, service: Service, name: impl Into<String>, tag: TagEntry) {
        self.tags.entry(service).or_default().insert(name.into(), tag);
    }

    /// Removes the pending value mutation for one resource.
    ///
    /// Inner maps left empty are pruned so that an emptied state compares
    /// equal to a fresh one.
    pub fn remove_entry(&mut self, service: Service, name: &str) -> Option<Entry> {
        let removed = self.entries.get_mut(&service).and_then(|m| m.remove(name));
        self.prune(service);
        removed
    }

    /// Removes the pending tag mutation for one resource.
    pub fn remove_tag(&mut self, service: Service, name: &str) -> Option<TagEntry> {
        let removed = self.tags.get_mut(&service).and_then(|m| m.remove(name));
        self.prune(service);
        removed
    }

    /// Snapshot of all pending value mutations for one service.
    pub fn list_entries(&self, service: Service) -> BTreeMap<String, Entry> {
        self.entries.get(&service).cloned().unwrap_or_default()
    }

    /// Snapshot of all pending tag mutations for one service.
    pub fn list_tags(&self, service: Service) -> BTreeMap<String, TagEntry> {
        self.tags.get(&service).cloned().unwrap_or_default()
    }

    /// Deep copy of this state filtered down to one service.
    pub fn extract_service(&self, service: Service) -> State {
        let mut out = State::new();
        if let Some(entries) = self.entries.get(&service) {
            if !entries.is_empty() {
                out.entries.insert(service, entries.clone());
            }
        }
        if let Some(tags) = self.tags.get(&service) {
            if !tags.is_empty() {
                out.tags.insert(service, tags.clone());
            }
        }
        out
    }

    /// Drops everything staged for one service.
    pub fn remove_service(&mut self, service: Service) {
        self.entries.remove(&service);
        self.tags.remove(&service);
    }

    /// Combines two states by (service, name) key with "other wins"
    /// semantics. Used to recombine per-service files into a global view.
    pub fn merged(mut self, other: State) -> State {
        for (service, entries) in other.entries {
            self.entries.entry(service).or_default().extend(entries);
        }
        for (service, tags) in other.tags {
            self.tags.entry(service).or_default().extend(tags);
        }
        self.normalize();
        self
    }

    /// Migrates a loaded state to the current format version.
    ///
    /// Older files lack maps that serde has already defaulted to empty, so
    /// migration only bumps the version. Files from a newer build are
    /// refused rather than silently misread.
    pub fn migrate(mut self) -> Result<State, TypesError> {
        if self.version > STATE_VERSION {
            return Err(TypesError::UnsupportedVersion(self.version));
        }
        self.version = STATE_VERSION;
        self.normalize();
        Ok(self)
    }

    /// Drops empty inner maps so structural equality ignores them.
    pub fn normalize(&mut self) {
        self.entries.retain(|_, m| !m.is_empty());
        self.tags.retain(|_, m| !m.is_empty());
    }

    fn prune(&mut self, service: Service) {
        if self.entries.get(&service).is_some_and(BTreeMap::is_empty) {
            self.entries.remove(&service);
        }
        if self.tags.get(&service).is_some_and(BTreeMap::is_empty) {
            self.tags.remove(&service);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::{DeleteOptions, Entry, Operation, TagEntry};

    fn ts(s: &str) -> crate::Timestamp {
        s.parse().unwrap()
    }

    fn sample_state() -> State {
        let mut state = State::new();
        state.set_entry(
            Service::Param,
            "/app/db-url",
            Entry::create("postgres://localhost".into(), None, ts("2024-03-01T10:00:00Z")),
        );
        state.set_entry(
            Service::Secret,
            "api-key",
            Entry::delete(
                Some(DeleteOptions::recovery_window(7).unwrap()),
                ts("2024-03-01T10:05:00Z"),
                Some(ts("2024-02-28T09:00:00Z")),
            ),
        );
        state.set_tag(
            Service::Param,
            "/app/db-url",
            TagEntry {
                add: [("env".to_string(), "prod".to_string())].into(),
                remove: ["legacy".to_string()].into(),
                staged_at: ts("2024-03-01T10:01:00Z"),
                base_modified_at: None,
            },
        );
        state
    }

    #[test]
    fn empty_state_has_no_keys() {
        let state = State::new();
        assert!(state.is_empty());
        assert_eq!(state.entry_count(), 0);
        assert_eq!(state.tag_count(), 0);
    }

    #[test]
    fn state_file_json_shape_is_pinned() {
        let state = sample_state();
        let expected = json!({
            "version": 2,
            "entries": {
                "param": {
                    "/app/db-url": {
                        "operation": "create",
                        "value": "postgres://localhost",
                        "staged_at": "2024-03-01T10:00:00Z",
                    }
                },
                "secret": {
                    "api-key": {
                        "operation": "delete",
                        "staged_at": "2024-03-01T10:05:00Z",
                        "base_modified_at": "2024-02-28T09:00:00Z",
                        "delete_options": {"force": false, "recovery_window": 7},
                    }
                }
            },
            "tags": {
                "param": {
                    "/app/db-url": {
                        "add": {"env": "prod"},
                        "remove": ["legacy"],
                        "staged_at": "2024-03-01T10:01:00Z",
                    }
                }
            }
        });
        assert_eq!(serde_json::to_value(&state).unwrap(), expected);
    }

    #[test]
    fn round_trips_through_json() {
        let state = sample_state();
        let bytes = serde_json::to_vec(&state).unwrap();
        let loaded: State = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn version_1_file_migrates_by_filling_missing_maps() {
        let old = json!({
            "version": 1,
            "entries": {
                "param": {
                    "/a": {
                        "operation": "update",
                        "value": "v2",
                        "staged_at": "2024-01-01T00:00:00Z",
                        "base_modified_at": "2024-01-01T00:00:00Z",
                    }
                }
            }
        });
        let state: State = serde_json::from_value(old).unwrap();
        let state = state.migrate().unwrap();
        assert_eq!(state.version, STATE_VERSION);
        assert!(state.tags.is_empty());
        assert_eq!(state.entry_count(), 1);
    }

    #[test]
    fn newer_version_is_refused() {
        let state = State {
            version: STATE_VERSION + 1,
            ..State::new()
        };
        assert!(state.migrate().is_err());
    }

    #[test]
    fn unknown_operation_is_a_parse_error() {
        let bad = json!({
            "version": 2,
            "entries": {
                "param": {
                    "/a": {"operation": "upsert", "staged_at": "2024-01-01T00:00:00Z"}
                }
            },
            "tags": {}
        });
        assert!(serde_json::from_value::<State>(bad).is_err());
    }

    #[test]
    fn removing_last_entry_leaves_state_equal_to_fresh() {
        let mut state = State::new();
        state.set_entry(
            Service::Param,
            "/a",
            Entry::create("v".into(), None, Utc.timestamp_opt(0, 0).unwrap()),
        );
        assert!(!state.is_empty());
        let removed = state.remove_entry(Service::Param, "/a").unwrap();
        assert_eq!(removed.operation, Operation::Create);
        assert!(state.is_empty());
        assert_eq!(state, State::new());
    }

    #[test]
    fn extract_service_is_a_filtered_deep_copy() {
        let state = sample_state();
        let params = state.extract_service(Service::Param);
        assert_eq!(params.entry_count(), 1);
        assert_eq!(params.tag_count(), 1);
        assert!(params.entry(Service::Secret, "api-key").is_none());
        // Original untouched
        assert_eq!(state.entry_count(), 2);
    }

    #[test]
    fn merged_is_other_wins_per_key() {
        let mut a = State::new();
        a.set_entry(
            Service::Param,
            "/a",
            Entry::create("old".into(), None, ts("2024-01-01T00:00:00Z")),
        );
        let mut b = State::new();
        b.set_entry(
            Service::Param,
            "/a",
            Entry::create("new".into(), None, ts("2024-01-02T00:00:00Z")),
        );
        b.set_entry(
            Service::Secret,
            "s",
            Entry::delete(None, ts("2024-01-02T00:00:00Z"), Some(ts("2024-01-01T00:00:00Z"))),
        );

        let merged = a.merged(b);
        assert_eq!(
            merged.entry(Service::Param, "/a").unwrap().value.as_deref(),
            Some("new")
        );
        assert_eq!(merged.entry_count(), 2);
    }
}
