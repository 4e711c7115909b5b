//! Request and response types for the agent protocol.

use serde::{Deserialize, Serialize};
use suve_types::{Entry, Hint, Service, State, TagEntry};

/// Bumped on incompatible protocol changes; echoed by `Ping`.
pub const PROTOCOL_VERSION: u32 = 1;

/// The namespace a request operates on.
///
/// `service: None` addresses both services at once, and is only valid for
/// the fan-out verbs (`ListEntries`, `ListTags`, `UnstageAll`, `Drain`,
/// `WriteState`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub account: String,
    pub region: String,
    pub service: Option<Service>,
}

impl Scope {
    pub fn service(account: impl Into<String>, region: impl Into<String>, service: Service) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            service: Some(service),
        }
    }

    pub fn global(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            service: None,
        }
    }
}

/// One request to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub scope: Scope,
    pub verb: Verb,
}

/// The fixed verb set. Service-scoped verbs require `scope.service`;
/// the rest accept a concrete service or the whole namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verb {
    GetEntry { name: String },
    GetTag { name: String },
    ListEntries,
    ListTags,
    StageEntry { name: String, entry: Entry },
    StageTag { name: String, tag: TagEntry },
    UnstageEntry { name: String, hint: Option<Hint> },
    UnstageTag { name: String, hint: Option<Hint> },
    UnstageAll { hint: Option<Hint> },
    Drain { keep: bool },
    WriteState { state: State },
    Ping,
}

/// One reply from the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// The verb succeeded and returns nothing.
    Ok,
    /// Reply to `GetEntry`.
    Entry(Option<Entry>),
    /// Reply to `GetTag`.
    Tag(Option<TagEntry>),
    /// Reply to `ListEntries`, `ListTags`, and `Drain`: the requested
    /// slice of the pending set.
    State(State),
    /// Reply to `Ping`.
    Pong { version: u32 },
    /// The verb failed.
    Error(ErrorResponse),
}

/// Machine-readable failure categories mirrored from the engine's error
/// kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Lookup or unstage of a key with no pending change.
    NotStaged,
    /// A service-scoped verb arrived without a service, or vice versa.
    InvalidScope,
    /// Malformed or forward-incompatible payload.
    InvalidRequest,
    /// Anything else; the message carries the detail.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl Response {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error(ErrorResponse {
            code,
            message: message.into(),
        })
    }
}
