//! Capability contracts for the two remote services.
//!
//! The engine consumes these narrow interfaces; the AWS-speaking client
//! implements them elsewhere, and tests use in-memory fakes. Both expose
//! `fetch_last_modified`, the probe the conflict detector runs against —
//! `Ok(None)` denotes "does not exist".

use std::collections::{BTreeMap, BTreeSet};

use suve_types::{DeleteOptions, Timestamp};
use suve_types::spec::SecretSelector;

/// Failures from the remote services, with the resource name attached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("resource '{name}' not found")]
    NotFound { name: String },

    #[error("remote error for '{name}': {message}")]
    Service { name: String, message: String },
}

impl RemoteError {
    pub fn not_found(name: impl Into<String>) -> Self {
        RemoteError::NotFound { name: name.into() }
    }

    pub fn service(name: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError::Service {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// A parameter as the remote sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    /// The remote's parameter type (e.g. `String`, `SecureString`).
    pub kind: String,
    pub version: i64,
    pub description: Option<String>,
    pub modified_at: Option<Timestamp>,
}

/// The default type assigned to parameters created by suve.
pub const DEFAULT_PARAM_KIND: &str = "String";

/// One version of a secret's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub name: String,
    pub value: String,
    pub version_id: String,
    pub modified_at: Option<Timestamp>,
}

/// A secret's metadata as the remote sees it, value excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMetadata {
    pub name: String,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub modified_at: Option<Timestamp>,
}

/// Version metadata for a secret, for selector resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVersion {
    pub id: String,
    pub labels: Vec<String>,
    pub created_at: Option<Timestamp>,
}

/// Parameter-service operations the engine needs.
pub trait ParamOps: Send + Sync {
    /// The current version.
    fn get(&self, name: &str) -> Result<Parameter, RemoteError>;

    /// A specific version by its linear number.
    fn get_version(&self, name: &str, version: i64) -> Result<Parameter, RemoteError>;

    /// Writes a value; `kind: None` asks the remote for its default type.
    fn put(
        &self,
        name: &str,
        value: &str,
        kind: Option<&str>,
        description: Option<&str>,
        overwrite: bool,
    ) -> Result<(), RemoteError>;

    fn delete(&self, name: &str) -> Result<(), RemoteError>;

    fn add_tags(&self, name: &str, tags: &BTreeMap<String, String>) -> Result<(), RemoteError>;

    fn remove_tags(&self, name: &str, keys: &BTreeSet<String>) -> Result<(), RemoteError>;

    /// `Ok(None)` when the parameter does not exist.
    fn fetch_last_modified(&self, name: &str) -> Result<Option<Timestamp>, RemoteError>;
}

/// Secret-service operations the engine needs.
pub trait SecretOps: Send + Sync {
    /// The current value, or a specific version by ID or label.
    fn get_value(
        &self,
        name: &str,
        selector: Option<&SecretSelector>,
    ) -> Result<SecretValue, RemoteError>;

    fn list_versions(&self, name: &str) -> Result<Vec<SecretVersion>, RemoteError>;

    /// Creates the secret, attaching `tags` atomically when given.
    fn create(
        &self,
        name: &str,
        value: &str,
        description: Option<&str>,
        tags: Option<&BTreeMap<String, String>>,
    ) -> Result<(), RemoteError>;

    /// Writes a new value version.
    fn put_value(&self, name: &str, value: &str) -> Result<(), RemoteError>;

    /// Updates the description only.
    fn update(&self, name: &str, description: &str) -> Result<(), RemoteError>;

    /// Deletes, forced or with a recovery window; `None` leaves the
    /// remote's default window in place.
    fn delete(&self, name: &str, options: Option<&DeleteOptions>) -> Result<(), RemoteError>;

    /// The secret's metadata, including its current tags.
    fn describe(&self, name: &str) -> Result<SecretMetadata, RemoteError>;

    fn tag(&self, name: &str, tags: &BTreeMap<String, String>) -> Result<(), RemoteError>;

    fn untag(&self, name: &str, keys: &BTreeSet<String>) -> Result<(), RemoteError>;

    /// `Ok(None)` when the secret does not exist.
    fn fetch_last_modified(&self, name: &str) -> Result<Option<Timestamp>, RemoteError>;
}
