//! The apply pipeline: walk the staged set and execute it remotely.
//!
//! Per service, the pipeline reads the pending entries and tag records,
//! runs the conflict detector, and — only when the whole batch is free of
//! conflicts — dispatches each item in name order. Failures are collected
//! per item, never aborting the rest of the batch; successfully applied
//! items are unstaged afterwards, so a partially failed batch keeps
//! exactly the unapplied work.

use std::collections::{BTreeMap, BTreeSet};

use suve_store::{GlobalStore, ServiceStore, StoreError};
use suve_types::{Cancel, Entry, Hint, Operation, Service, TagEntry, Timestamp};
use tracing::{debug, warn};

use crate::SuveError;
use crate::conflict::{LastModifiedProbe, check_conflicts};
use crate::remote::{DEFAULT_PARAM_KIND, ParamOps, RemoteError, SecretOps};

// ============================================================================
// Strategies
// ============================================================================

/// How one service's staged items translate into remote calls.
///
/// The two services share this shape but differ in delete options, create
/// semantics, and tag APIs; [`ParamStrategy`] and [`SecretStrategy`] are
/// the two implementations.
pub trait ApplyStrategy: LastModifiedProbe + Send + Sync {
    fn service(&self) -> Service;

    fn apply_entry(&self, name: &str, entry: &Entry) -> Result<(), RemoteError>;

    /// Applies a tag record: adds first, then removals.
    fn apply_tags(&self, name: &str, tags: &TagEntry) -> Result<(), RemoteError>;
}

/// Parameter-service strategy.
pub struct ParamStrategy<P> {
    ops: P,
}

impl<P: ParamOps> ParamStrategy<P> {
    pub fn new(ops: P) -> Self {
        Self { ops }
    }
}

impl<P: ParamOps> LastModifiedProbe for ParamStrategy<P> {
    fn fetch_last_modified(&self, name: &str) -> Result<Option<Timestamp>, RemoteError> {
        self.ops.fetch_last_modified(name)
    }
}

impl<P: ParamOps> ApplyStrategy for ParamStrategy<P> {
    fn service(&self) -> Service {
        Service::Param
    }

    fn apply_entry(&self, name: &str, entry: &Entry) -> Result<(), RemoteError> {
        match entry.operation {
            Operation::Create => {
                let value = entry_value(name, entry)?;
                // Preserve the type of a parameter that appeared since the
                // conflict check; a truly new one gets the default type and
                // no overwrite, so racing creates still fail loudly.
                match self.ops.get(name) {
                    Ok(existing) => self.ops.put(
                        name,
                        value,
                        Some(&existing.kind),
                        entry.description.as_deref(),
                        true,
                    ),
                    Err(e) if e.is_not_found() => self.ops.put(
                        name,
                        value,
                        Some(DEFAULT_PARAM_KIND),
                        entry.description.as_deref(),
                        false,
                    ),
                    Err(e) => Err(e),
                }
            }
            Operation::Update => {
                let value = entry_value(name, entry)?;
                let current = self.ops.get(name)?;
                self.ops.put(
                    name,
                    value,
                    Some(&current.kind),
                    entry.description.as_deref(),
                    true,
                )
            }
            Operation::Delete => match self.ops.delete(name) {
                // Already gone: the intended end state holds.
                Err(e) if e.is_not_found() => Ok(()),
                other => other,
            },
        }
    }

    fn apply_tags(&self, name: &str, tags: &TagEntry) -> Result<(), RemoteError> {
        if !tags.add.is_empty() {
            self.ops.add_tags(name, &tags.add)?;
        }
        if !tags.remove.is_empty() {
            self.ops.remove_tags(name, &tags.remove)?;
        }
        Ok(())
    }
}

/// Secret-service strategy.
pub struct SecretStrategy<S> {
    ops: S,
}

impl<S: SecretOps> SecretStrategy<S> {
    pub fn new(ops: S) -> Self {
        Self { ops }
    }
}

impl<S: SecretOps> LastModifiedProbe for SecretStrategy<S> {
    fn fetch_last_modified(&self, name: &str) -> Result<Option<Timestamp>, RemoteError> {
        self.ops.fetch_last_modified(name)
    }
}

impl<S: SecretOps> ApplyStrategy for SecretStrategy<S> {
    fn service(&self) -> Service {
        Service::Secret
    }

    fn apply_entry(&self, name: &str, entry: &Entry) -> Result<(), RemoteError> {
        match entry.operation {
            Operation::Create => {
                let value = entry_value(name, entry)?;
                // Create-time tags ride on the create call itself.
                self.ops.create(
                    name,
                    value,
                    entry.description.as_deref(),
                    entry.tags_snapshot.as_ref(),
                )
            }
            Operation::Update => {
                let value = entry_value(name, entry)?;
                self.ops.put_value(name, value)?;
                if let Some(description) = &entry.description {
                    self.ops.update(name, description)?;
                }
                Ok(())
            }
            Operation::Delete => match self.ops.delete(name, entry.delete_options.as_ref()) {
                Err(e) if e.is_not_found() => Ok(()),
                other => other,
            },
        }
    }

    fn apply_tags(&self, name: &str, tags: &TagEntry) -> Result<(), RemoteError> {
        if !tags.add.is_empty() {
            self.ops.tag(name, &tags.add)?;
        }
        if !tags.remove.is_empty() {
            self.ops.untag(name, &tags.remove)?;
        }
        Ok(())
    }
}

fn entry_value<'a>(name: &str, entry: &'a Entry) -> Result<&'a str, RemoteError> {
    entry
        .value
        .as_deref()
        .ok_or_else(|| RemoteError::service(name, "staged entry carries no value"))
}

// ============================================================================
// Pipeline
// ============================================================================

/// What one staged item turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedChange {
    Create,
    Update,
    Delete,
    Tags,
}

impl From<Operation> for AppliedChange {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Create => AppliedChange::Create,
            Operation::Update => AppliedChange::Update,
            Operation::Delete => AppliedChange::Delete,
        }
    }
}

/// Per-item result of an apply run.
#[derive(Debug)]
pub struct ApplyOutcome {
    pub service: Service,
    pub name: String,
    pub change: AppliedChange,
    pub error: Option<RemoteError>,
}

/// Everything an apply run did (or refused to do).
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Names the detector flagged, per service. Non-empty means nothing
    /// was written.
    pub conflicts: BTreeMap<Service, BTreeSet<String>>,
    pub outcomes: Vec<ApplyOutcome>,
}

impl ApplyReport {
    pub fn has_conflicts(&self) -> bool {
        self.conflicts.values().any(|names| !names.is_empty())
    }

    /// True when the batch ran and every item applied cleanly.
    pub fn fully_applied(&self) -> bool {
        !self.has_conflicts() && self.outcomes.iter().all(|o| o.error.is_none())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ApplyOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

/// Applies every staged change across both services.
///
/// Conflicts abort the whole batch before any remote write. Otherwise
/// items dispatch in name order per service, failures are collected, and
/// applied items are unstaged: through one global `unstage_all` carrying
/// the apply hint when the batch was fully clean, per item otherwise.
pub fn apply_all(
    global: &dyn GlobalStore,
    services: &[(&dyn ServiceStore, &dyn ApplyStrategy)],
    cancel: &Cancel,
) -> Result<ApplyReport, SuveError> {
    let mut report = ApplyReport::default();

    // Read and conflict-check everything before writing anything.
    let mut batches = Vec::new();
    for &(store, strategy) in services {
        let entries = store.list_entries()?;
        let tags = store.list_tags()?;
        let probe: &dyn LastModifiedProbe = strategy;
        let conflicts = check_conflicts(&entries, probe, cancel)?;
        if !conflicts.is_empty() {
            report.conflicts.insert(strategy.service(), conflicts);
        }
        batches.push((store, strategy, entries, tags));
    }
    if report.has_conflicts() {
        return Ok(report);
    }

    // Dispatch, collecting per-item outcomes.
    let mut applied: Vec<(&dyn ServiceStore, AppliedKey)> = Vec::new();
    for (store, strategy, entries, tags) in &batches {
        let service = strategy.service();

        for (name, entry) in entries {
            if cancel.is_canceled() {
                return Err(SuveError::Canceled);
            }
            let result = strategy.apply_entry(name, entry);
            debug!(%service, name, op = %entry.operation, ok = result.is_ok(), "applied entry");
            if result.is_ok() {
                applied.push((*store, AppliedKey::Entry(name.clone())));
            }
            report.outcomes.push(ApplyOutcome {
                service,
                name: name.clone(),
                change: entry.operation.into(),
                error: result.err(),
            });
        }

        for (name, tag) in tags {
            if cancel.is_canceled() {
                return Err(SuveError::Canceled);
            }
            // A deleted resource takes its tag record down silently; this
            // should have been rejected at stage time, but apply stays
            // defensive.
            if entries
                .get(name)
                .is_some_and(|e| e.operation == Operation::Delete)
            {
                applied.push((*store, AppliedKey::Tag(name.clone())));
                continue;
            }
            let result = strategy.apply_tags(name, tag);
            debug!(%service, name, ok = result.is_ok(), "applied tags");
            if result.is_ok() {
                applied.push((*store, AppliedKey::Tag(name.clone())));
            }
            report.outcomes.push(ApplyOutcome {
                service,
                name: name.clone(),
                change: AppliedChange::Tags,
                error: result.err(),
            });
        }
    }

    // Remove what landed. A fully clean batch empties the whole staged
    // set in one hinted call (this is what lets the agent exit with
    // "all changes applied"); otherwise only the successes go.
    if report.fully_applied() {
        global.unstage_all(Some(Hint::Apply))?;
    } else {
        for (store, key) in applied {
            let result = match &key {
                AppliedKey::Entry(name) => store.unstage_entry(name, Some(Hint::Apply)),
                AppliedKey::Tag(name) => store.unstage_tag(name, Some(Hint::Apply)),
            };
            match result {
                Ok(()) | Err(StoreError::NotStaged { .. }) => {}
                Err(e) => warn!(error = %e, "failed to unstage an applied item"),
            }
        }
    }

    Ok(report)
}

enum AppliedKey {
    Entry(String),
    Tag(String),
}
