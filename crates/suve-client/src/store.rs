//! Backend facade over the agent daemon.

use std::collections::BTreeMap;

use suve_store::{GlobalStore, ServiceStore, StoreError};
use suve_types::{Entry, Hint, Service, State, TagEntry};
use suve_wire::{ErrorCode, ErrorResponse, Request, Response, Scope, Verb};

use crate::{AgentClient, ClientError};

/// Agent-backed store for one (account, region) namespace.
///
/// The daemon holds the authoritative state while it runs; this type just
/// translates facade calls into wire verbs.
#[derive(Debug, Clone)]
pub struct AgentStore {
    client: AgentClient,
    account: String,
    region: String,
}

impl AgentStore {
    pub fn new(client: AgentClient, account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client,
            account: account.into(),
            region: region.into(),
        }
    }

    /// A handle scoped to one service.
    pub fn scoped(&self, service: Service) -> AgentServiceStore {
        AgentServiceStore {
            store: self.clone(),
            service,
        }
    }

    fn service_scope(&self, service: Service) -> Scope {
        Scope::service(self.account.clone(), self.region.clone(), service)
    }

    fn global_scope(&self) -> Scope {
        Scope::global(self.account.clone(), self.region.clone())
    }

    /// Read verb: a missing daemon (auto-start off) reads as empty.
    fn read(&self, scope: Scope, verb: Verb) -> Result<Option<Response>, StoreError> {
        self.client
            .request_read(&Request { scope, verb })
            .map_err(client_error)
    }

    /// Write verb: the daemon is started on demand or the call fails.
    fn write(&self, scope: Scope, verb: Verb) -> Result<Response, StoreError> {
        self.client
            .request_write(&Request { scope, verb })
            .map_err(client_error)
    }
}

fn client_error(e: ClientError) -> StoreError {
    match e {
        ClientError::DaemonUnavailable => StoreError::DaemonUnavailable,
        other => StoreError::Agent(other.to_string()),
    }
}

fn agent_error(err: ErrorResponse, name: Option<&str>) -> StoreError {
    match (err.code, name) {
        (ErrorCode::NotStaged, Some(name)) => StoreError::NotStaged {
            name: name.to_string(),
        },
        _ => StoreError::Agent(err.message),
    }
}

/// Unwraps a `State` reply, treating "no daemon" as the empty state.
fn expect_state(response: Option<Response>) -> Result<State, StoreError> {
    match response {
        None => Ok(State::new()),
        Some(Response::State(state)) => Ok(state),
        Some(Response::Error(err)) => Err(agent_error(err, None)),
        Some(other) => Err(StoreError::Agent(format!("unexpected reply {other:?}"))),
    }
}

fn expect_ok(response: Response, name: Option<&str>) -> Result<(), StoreError> {
    match response {
        Response::Ok => Ok(()),
        Response::Error(err) => Err(agent_error(err, name)),
        other => Err(StoreError::Agent(format!("unexpected reply {other:?}"))),
    }
}

// ============================================================================
// Service-scoped handle
// ============================================================================

/// [`ServiceStore`] over one service inside the agent.
#[derive(Debug, Clone)]
pub struct AgentServiceStore {
    store: AgentStore,
    service: Service,
}

impl ServiceStore for AgentServiceStore {
    fn service(&self) -> Service {
        self.service
    }

    fn get_entry(&self, name: &str) -> Result<Option<Entry>, StoreError> {
        let scope = self.store.service_scope(self.service);
        match self.store.read(scope, Verb::GetEntry { name: name.into() })? {
            None => Ok(None),
            Some(Response::Entry(entry)) => Ok(entry),
            Some(Response::Error(err)) => Err(agent_error(err, None)),
            Some(other) => Err(StoreError::Agent(format!("unexpected reply {other:?}"))),
        }
    }

    fn get_tag(&self, name: &str) -> Result<Option<TagEntry>, StoreError> {
        let scope = self.store.service_scope(self.service);
        match self.store.read(scope, Verb::GetTag { name: name.into() })? {
            None => Ok(None),
            Some(Response::Tag(tag)) => Ok(tag),
            Some(Response::Error(err)) => Err(agent_error(err, None)),
            Some(other) => Err(StoreError::Agent(format!("unexpected reply {other:?}"))),
        }
    }

    fn list_entries(&self) -> Result<BTreeMap<String, Entry>, StoreError> {
        let scope = self.store.service_scope(self.service);
        let state = expect_state(self.store.read(scope, Verb::ListEntries)?)?;
        Ok(state.list_entries(self.service))
    }

    fn list_tags(&self) -> Result<BTreeMap<String, TagEntry>, StoreError> {
        let scope = self.store.service_scope(self.service);
        let state = expect_state(self.store.read(scope, Verb::ListTags)?)?;
        Ok(state.list_tags(self.service))
    }

    fn stage_entry(&self, name: &str, entry: Entry) -> Result<(), StoreError> {
        let scope = self.store.service_scope(self.service);
        let response = self.store.write(
            scope,
            Verb::StageEntry {
                name: name.into(),
                entry,
            },
        )?;
        expect_ok(response, None)
    }

    fn stage_tag(&self, name: &str, tag: TagEntry) -> Result<(), StoreError> {
        let scope = self.store.service_scope(self.service);
        let response = self.store.write(
            scope,
            Verb::StageTag {
                name: name.into(),
                tag,
            },
        )?;
        expect_ok(response, None)
    }

    fn unstage_entry(&self, name: &str, hint: Option<Hint>) -> Result<(), StoreError> {
        let scope = self.store.service_scope(self.service);
        let response = self.store.write(
            scope,
            Verb::UnstageEntry {
                name: name.into(),
                hint,
            },
        )?;
        expect_ok(response, Some(name))
    }

    fn unstage_tag(&self, name: &str, hint: Option<Hint>) -> Result<(), StoreError> {
        let scope = self.store.service_scope(self.service);
        let response = self.store.write(
            scope,
            Verb::UnstageTag {
                name: name.into(),
                hint,
            },
        )?;
        expect_ok(response, Some(name))
    }

    fn drain(&self, keep: bool) -> Result<State, StoreError> {
        let scope = self.store.service_scope(self.service);
        let response = self.store.write(scope, Verb::Drain { keep })?;
        expect_state(Some(response))
    }

    fn write_state(&self, state: State) -> Result<(), StoreError> {
        let scope = self.store.service_scope(self.service);
        let response = self.store.write(scope, Verb::WriteState { state })?;
        expect_ok(response, None)
    }
}

// ============================================================================
// Global view
// ============================================================================

impl GlobalStore for AgentStore {
    fn list(&self) -> Result<State, StoreError> {
        let entries = expect_state(self.read(self.global_scope(), Verb::ListEntries)?)?;
        let tags = expect_state(self.read(self.global_scope(), Verb::ListTags)?)?;
        Ok(entries.merged(tags))
    }

    fn unstage_all(&self, hint: Option<Hint>) -> Result<(), StoreError> {
        let response = self.write(self.global_scope(), Verb::UnstageAll { hint })?;
        expect_ok(response, None)
    }

    fn drain(&self, keep: bool) -> Result<State, StoreError> {
        let response = self.write(self.global_scope(), Verb::Drain { keep })?;
        expect_state(Some(response))
    }

    fn write_state(&self, state: State) -> Result<(), StoreError> {
        let response = self.write(self.global_scope(), Verb::WriteState { state })?;
        expect_ok(response, None)
    }
}
