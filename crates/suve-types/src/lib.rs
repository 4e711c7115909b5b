//! # suve-types: Core types for suve
//!
//! This crate contains the shared data model used across the suve system:
//! - Service discrimination ([`Service`])
//! - Pending value mutations ([`Entry`], [`Operation`], [`DeleteOptions`])
//! - Pending tag mutations ([`TagEntry`])
//! - The whole pending set ([`State`])
//! - Resource name specifications ([`spec::ParamSpec`], [`spec::SecretSpec`])
//!
//! Everything here is plain data: serde-derived, no I/O, no clocks. The
//! on-disk JSON representation of [`State`] is part of the tool's contract
//! and is pinned by the serialization tests in [`state`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod spec;
pub mod state;

pub use state::{STATE_VERSION, State};

/// Wall-clock timestamp, serialized RFC3339.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// Service
// ============================================================================

/// The two resource families suve stages mutations against.
///
/// Used as an outer key throughout; the two services never
/// cross-contaminate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Parameter service: value + type, versioned linearly by integer.
    Param,
    /// Secret service: opaque value, versioned by opaque ID with labels.
    Secret,
}

impl Service {
    /// All services, in stable order.
    pub const ALL: [Service; 2] = [Service::Param, Service::Secret];

    /// The literal string used as a map key in the state file.
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Param => "param",
            Service::Secret => "secret",
        }
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "param" => Ok(Service::Param),
            "secret" => Ok(Service::Secret),
            other => Err(TypesError::UnknownService(other.to_string())),
        }
    }
}

// ============================================================================
// Operation
// ============================================================================

/// The kind of pending value mutation. Tag changes live outside this axis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Delete options (Secret only)
// ============================================================================

/// Valid recovery-window range for a scheduled secret deletion, in days.
pub const RECOVERY_WINDOW_DAYS: std::ops::RangeInclusive<u32> = 7..=30;

/// How a secret deletion is carried out: either forced (no recovery) or
/// scheduled with a recovery window. Exactly one of the two applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {
    pub force: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_window: Option<u32>,
}

impl DeleteOptions {
    /// Force deletion without a recovery window.
    pub fn force() -> Self {
        Self {
            force: true,
            recovery_window: None,
        }
    }

    /// Scheduled deletion with a recovery window of `days` (7–30).
    pub fn recovery_window(days: u32) -> Result<Self, TypesError> {
        if !RECOVERY_WINDOW_DAYS.contains(&days) {
            return Err(TypesError::InvalidRecoveryWindow(days));
        }
        Ok(Self {
            force: false,
            recovery_window: Some(days),
        })
    }
}

// ============================================================================
// Entry - a pending mutation of a resource's value
// ============================================================================

/// A pending mutation of one resource's value.
///
/// Invariant: `operation == Delete` implies `value.is_none()`, and
/// `operation == Create` implies `base_modified_at.is_none()` (a draft of
/// a resource that does not exist remotely has no base generation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Create-time tag set, Secret only; attached atomically on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags_snapshot: Option<BTreeMap<String, String>>,
    /// Keys the user untagged while the create was still pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub untag_keys_snapshot: Option<BTreeSet<String>>,
    pub staged_at: Timestamp,
    /// The remote's last-modified timestamp observed when the draft was
    /// created; `None` for Create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_modified_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_options: Option<DeleteOptions>,
}

impl Entry {
    /// A pending create of a resource that does not exist remotely.
    pub fn create(value: String, description: Option<String>, staged_at: Timestamp) -> Self {
        Self {
            operation: Operation::Create,
            value: Some(value),
            description,
            tags_snapshot: None,
            untag_keys_snapshot: None,
            staged_at,
            base_modified_at: None,
            delete_options: None,
        }
    }

    /// A pending update of an existing remote resource.
    pub fn update(
        value: String,
        description: Option<String>,
        staged_at: Timestamp,
        base_modified_at: Option<Timestamp>,
    ) -> Self {
        Self {
            operation: Operation::Update,
            value: Some(value),
            description,
            tags_snapshot: None,
            untag_keys_snapshot: None,
            staged_at,
            base_modified_at,
            delete_options: None,
        }
    }

    /// A pending delete. Carries no value.
    pub fn delete(
        options: Option<DeleteOptions>,
        staged_at: Timestamp,
        base_modified_at: Option<Timestamp>,
    ) -> Self {
        Self {
            operation: Operation::Delete,
            value: None,
            description: None,
            tags_snapshot: None,
            untag_keys_snapshot: None,
            staged_at,
            base_modified_at,
            delete_options: options,
        }
    }
}

// ============================================================================
// TagEntry - a pending mutation of a resource's tag set
// ============================================================================

/// A pending tag-set mutation expressed as disjoint (add, remove) sets.
///
/// The record means "ensure these keys have these values, and ensure those
/// keys are gone" — not "this is the whole tag set". Disjointness
/// (`add` keys never appear in `remove`) is maintained by the reducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    #[serde(default)]
    pub add: BTreeMap<String, String>,
    #[serde(default)]
    pub remove: BTreeSet<String>,
    pub staged_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_modified_at: Option<Timestamp>,
}

impl TagEntry {
    /// True when the record describes no change at all. Such a record is
    /// never stored (it collapses to "no record").
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

// ============================================================================
// Hints
// ============================================================================

/// Why an unstage happened.
///
/// Attached to unstage operations so the agent daemon can word its exit
/// message accurately when the last pending change is removed. Carries no
/// other behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hint {
    /// The changes were applied to the remote service.
    Apply,
    /// The user discarded the changes.
    Reset,
    /// The state was persisted to the file backend.
    Persist,
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation token.
///
/// Checked between items by the conflict detector and the apply pipeline,
/// and before lock acquisition in the file backend. Cloning shares the
/// token.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; observable through every clone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Validation and parse errors for the shared data model.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("recovery window must be between 7 and 30 days, got {0}")]
    InvalidRecoveryWindow(u32),

    #[error("state file version {0} is newer than this build supports")]
    UnsupportedVersion(u32),
}
