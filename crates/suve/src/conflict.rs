//! Conflict detection against the remote authority.
//!
//! Before any remote write, the staged set is checked for drift: a
//! pending create conflicts when the resource has appeared remotely, and
//! a pending update or delete conflicts when the remote moved past the
//! draft's base timestamp. Probes fan out in parallel with a bounded
//! worker count and all results are gathered before judging.

use std::collections::{BTreeMap, BTreeSet};

use suve_types::{Cancel, Entry, Operation, Timestamp};
use tracing::debug;

use crate::SuveError;
use crate::remote::RemoteError;

/// Upper bound on concurrent remote probes.
const PROBE_WORKERS: usize = 8;

/// The one remote capability the detector needs.
///
/// Both service contracts expose it; [`crate::apply::ApplyStrategy`]
/// carries it as a supertrait.
pub trait LastModifiedProbe: Sync {
    /// `Ok(None)` when the resource does not exist remotely.
    fn fetch_last_modified(&self, name: &str) -> Result<Option<Timestamp>, RemoteError>;
}

/// Checks one service's pending entries for drift.
///
/// Returns the conflicted names. Probe failures are treated as "no
/// conflict": the apply that follows will fail loudly on the same
/// resource anyway. The detector never mutates the staged set and never
/// calls a write path.
pub fn check_conflicts(
    entries: &BTreeMap<String, Entry>,
    probe: &dyn LastModifiedProbe,
    cancel: &Cancel,
) -> Result<BTreeSet<String>, SuveError> {
    if cancel.is_canceled() {
        return Err(SuveError::Canceled);
    }

    // Partition: creates conflict on existence, updates/deletes with an
    // observed base conflict on a newer remote timestamp. Entries with no
    // base (nothing was observed at stage time) have nothing to compare.
    let mut create_check: BTreeSet<&str> = BTreeSet::new();
    let mut mod_check: BTreeMap<&str, Timestamp> = BTreeMap::new();
    for (name, entry) in entries {
        match entry.operation {
            Operation::Create => {
                create_check.insert(name.as_str());
            }
            Operation::Update | Operation::Delete => {
                if let Some(base) = entry.base_modified_at {
                    mod_check.insert(name.as_str(), base);
                }
            }
        }
    }

    let targets: Vec<&str> = create_check
        .iter()
        .copied()
        .chain(mod_check.keys().copied())
        .collect();
    if targets.is_empty() {
        return Ok(BTreeSet::new());
    }

    let results = probe_all(&targets, probe)?;

    let mut conflicts = BTreeSet::new();
    for name in create_check {
        // The resource now exists: someone else created it first.
        if let Some(Ok(Some(_))) = results.get(name) {
            conflicts.insert(name.to_string());
        }
    }
    for (name, base) in mod_check {
        match results.get(name) {
            // Strictly-after means drift; an equal timestamp is ours.
            Some(Ok(Some(remote))) if *remote > base => {
                conflicts.insert(name.to_string());
            }
            // Gone remotely: deletes are idempotent and updates will
            // surface a missing-resource error at apply time.
            _ => {}
        }
    }

    debug!(probed = targets.len(), conflicts = conflicts.len(), "conflict check finished");
    Ok(conflicts)
}

type ProbeResults = BTreeMap<String, Result<Option<Timestamp>, RemoteError>>;

/// Fans the probe out over a bounded rayon pool, gathering every result.
fn probe_all(targets: &[&str], probe: &dyn LastModifiedProbe) -> Result<ProbeResults, SuveError> {
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(PROBE_WORKERS.min(targets.len()))
        .build()
        .map_err(|e| SuveError::Remote(RemoteError::service("", e.to_string())))?;

    Ok(pool.install(|| {
        targets
            .par_iter()
            .map(|name| ((*name).to_string(), probe.fetch_last_modified(name)))
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use suve_types::Entry;

    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    /// Probe fake: canned answers per name, recording what was asked.
    struct FakeProbe {
        answers: BTreeMap<String, Result<Option<Timestamp>, RemoteError>>,
        asked: Mutex<BTreeSet<String>>,
    }

    impl FakeProbe {
        fn new(answers: Vec<(&str, Result<Option<Timestamp>, RemoteError>)>) -> Self {
            Self {
                answers: answers
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                asked: Mutex::new(BTreeSet::new()),
            }
        }
    }

    impl LastModifiedProbe for FakeProbe {
        fn fetch_last_modified(&self, name: &str) -> Result<Option<Timestamp>, RemoteError> {
            self.asked.lock().unwrap().insert(name.to_string());
            self.answers
                .get(name)
                .cloned()
                .unwrap_or_else(|| Ok(None))
        }
    }

    fn create_entry() -> Entry {
        Entry::create("v1".into(), None, ts("2024-01-01T12:00:00Z"))
    }

    fn update_entry(base: &str) -> Entry {
        Entry::update("v2".into(), None, ts("2024-01-01T12:00:00Z"), Some(ts(base)))
    }

    #[test]
    fn update_conflicts_when_remote_moved_past_the_base() {
        let entries = BTreeMap::from([("/a".to_string(), update_entry("2024-01-01T12:00:00Z"))]);
        let probe = FakeProbe::new(vec![("/a", Ok(Some(ts("2024-01-01T13:00:00Z"))))]);
        let conflicts = check_conflicts(&entries, &probe, &Cancel::new()).unwrap();
        assert_eq!(conflicts, BTreeSet::from(["/a".to_string()]));
    }

    #[test]
    fn equal_timestamps_are_not_conflicts() {
        let entries = BTreeMap::from([("/a".to_string(), update_entry("2024-01-01T12:00:00Z"))]);
        let probe = FakeProbe::new(vec![("/a", Ok(Some(ts("2024-01-01T12:00:00Z"))))]);
        let conflicts = check_conflicts(&entries, &probe, &Cancel::new()).unwrap();
        assert!(conflicts.is_empty());
    }

    #[test]
    fn a_vanished_resource_is_not_a_conflict() {
        let entries = BTreeMap::from([
            ("/upd".to_string(), update_entry("2024-01-01T12:00:00Z")),
            (
                "/del".to_string(),
                Entry::delete(None, ts("2024-01-01T12:00:00Z"), Some(ts("2024-01-01T12:00:00Z"))),
            ),
        ]);
        let probe = FakeProbe::new(vec![("/upd", Ok(None)), ("/del", Ok(None))]);
        let conflicts = check_conflicts(&entries, &probe, &Cancel::new()).unwrap();
        assert!(conflicts.is_empty());
    }

    #[test]
    fn create_conflicts_when_the_resource_appeared() {
        let entries = BTreeMap::from([("/new".to_string(), create_entry())]);
        let probe = FakeProbe::new(vec![("/new", Ok(Some(ts("2024-01-01T13:00:00Z"))))]);
        let conflicts = check_conflicts(&entries, &probe, &Cancel::new()).unwrap();
        assert_eq!(conflicts, BTreeSet::from(["/new".to_string()]));
    }

    #[test]
    fn create_with_no_remote_counterpart_is_clean() {
        let entries = BTreeMap::from([("/new".to_string(), create_entry())]);
        let probe = FakeProbe::new(vec![("/new", Ok(None))]);
        let conflicts = check_conflicts(&entries, &probe, &Cancel::new()).unwrap();
        assert!(conflicts.is_empty());
    }

    #[test]
    fn probe_errors_do_not_conflict() {
        let entries = BTreeMap::from([
            ("/new".to_string(), create_entry()),
            ("/upd".to_string(), update_entry("2024-01-01T12:00:00Z")),
        ]);
        let probe = FakeProbe::new(vec![
            ("/new", Err(RemoteError::service("/new", "throttled"))),
            ("/upd", Err(RemoteError::service("/upd", "throttled"))),
        ]);
        let conflicts = check_conflicts(&entries, &probe, &Cancel::new()).unwrap();
        assert!(conflicts.is_empty());
    }

    #[test]
    fn every_candidate_is_probed() {
        let entries = BTreeMap::from([
            ("/a".to_string(), create_entry()),
            ("/b".to_string(), update_entry("2024-01-01T12:00:00Z")),
            ("/c".to_string(), update_entry("2024-01-01T12:00:00Z")),
        ]);
        let probe = FakeProbe::new(vec![]);
        check_conflicts(&entries, &probe, &Cancel::new()).unwrap();
        let asked = probe.asked.lock().unwrap();
        assert_eq!(
            *asked,
            BTreeSet::from(["/a".to_string(), "/b".to_string(), "/c".to_string()])
        );
    }

    #[test]
    fn canceled_check_short_circuits() {
        let cancel = Cancel::new();
        cancel.cancel();
        let entries = BTreeMap::from([("/a".to_string(), create_entry())]);
        let probe = FakeProbe::new(vec![]);
        let result = check_conflicts(&entries, &probe, &cancel);
        assert!(matches!(result, Err(SuveError::Canceled)));
    }

    #[test]
    fn update_without_a_base_is_never_checked() {
        let entries = BTreeMap::from([(
            "/a".to_string(),
            Entry::update("v2".into(), None, ts("2024-01-01T12:00:00Z"), None),
        )]);
        let probe = FakeProbe::new(vec![("/a", Ok(Some(ts("2030-01-01T00:00:00Z"))))]);
        let conflicts = check_conflicts(&entries, &probe, &Cancel::new()).unwrap();
        assert!(conflicts.is_empty());
        assert!(probe.asked.lock().unwrap().is_empty());
    }
}
