//! Request handler that routes verbs to the in-memory registry.

use std::sync::{Mutex, PoisonError};

use suve_types::Hint;
use suve_wire::{ErrorCode, PROTOCOL_VERSION, Request, Response, Verb};
use tracing::debug;

use crate::registry::Registry;

/// Why the daemon is exiting: a successful unstage left every namespace
/// empty. The hint it carried words the exit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shutdown {
    pub hint: Option<Hint>,
}

impl Shutdown {
    /// The one-line exit message printed before the process exits.
    pub fn exit_line(&self) -> &'static str {
        match self.hint {
            Some(Hint::Apply) => "all changes applied",
            Some(Hint::Reset) => "all changes unstaged",
            Some(Hint::Persist) => "state saved to file",
            None => "nothing left staged",
        }
    }
}

/// Routes requests to the registry, serializing all verbs on one mutex.
///
/// No verb may itself wait on another verb: everything in here is a
/// memory operation completed before the lock is released.
pub struct Handler {
    registry: Mutex<Registry>,
    /// Manual mode: never auto-shutdown on empty.
    manual: bool,
}

impl Handler {
    pub fn new(manual: bool) -> Self {
        Self {
            registry: Mutex::new(Registry::new()),
            manual,
        }
    }

    /// Handles one request. A `Some` shutdown means the caller must send
    /// the response and then exit the daemon.
    pub fn handle(&self, request: Request) -> (Response, Option<Shutdown>) {
        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let scope = request.scope;
        let (account, region) = (scope.account.as_str(), scope.region.as_str());

        match request.verb {
            Verb::Ping => (
                Response::Pong {
                    version: PROTOCOL_VERSION,
                },
                None,
            ),

            Verb::GetEntry { name } => {
                let Some(service) = scope.service else {
                    return (service_required("get_entry"), None);
                };
                let entry = registry
                    .state(account, region)
                    .and_then(|s| s.entry(service, &name))
                    .cloned();
                (Response::Entry(entry), None)
            }

            Verb::GetTag { name } => {
                let Some(service) = scope.service else {
                    return (service_required("get_tag"), None);
                };
                let tag = registry
                    .state(account, region)
                    .and_then(|s| s.tag(service, &name))
                    .cloned();
                (Response::Tag(tag), None)
            }

            Verb::ListEntries => {
                let mut slice = registry.slice(account, region, scope.service);
                slice.tags.clear();
                (Response::State(slice), None)
            }

            Verb::ListTags => {
                let mut slice = registry.slice(account, region, scope.service);
                slice.entries.clear();
                (Response::State(slice), None)
            }

            Verb::StageEntry { name, entry } => {
                let Some(service) = scope.service else {
                    return (service_required("stage_entry"), None);
                };
                debug!(account, region, %service, name, "stage entry");
                registry.state_mut(account, region).set_entry(service, name, entry);
                (Response::Ok, None)
            }

            Verb::StageTag { name, tag } => {
                let Some(service) = scope.service else {
                    return (service_required("stage_tag"), None);
                };
                debug!(account, region, %service, name, "stage tag");
                registry.state_mut(account, region).set_tag(service, name, tag);
                (Response::Ok, None)
            }

            Verb::UnstageEntry { name, hint } => {
                let Some(service) = scope.service else {
                    return (service_required("unstage_entry"), None);
                };
                if registry
                    .state_mut(account, region)
                    .remove_entry(service, &name)
                    .is_none()
                {
                    return (
                        Response::error(ErrorCode::NotStaged, format!("nothing staged for '{name}'")),
                        None,
                    );
                }
                debug!(account, region, %service, name, ?hint, "unstaged entry");
                (Response::Ok, self.shutdown_if_empty(&registry, hint))
            }

            Verb::UnstageTag { name, hint } => {
                let Some(service) = scope.service else {
                    return (service_required("unstage_tag"), None);
                };
                if registry
                    .state_mut(account, region)
                    .remove_tag(service, &name)
                    .is_none()
                {
                    return (
                        Response::error(ErrorCode::NotStaged, format!("nothing staged for '{name}'")),
                        None,
                    );
                }
                debug!(account, region, %service, name, ?hint, "unstaged tag");
                (Response::Ok, self.shutdown_if_empty(&registry, hint))
            }

            Verb::UnstageAll { hint } => {
                registry.clear(account, region, scope.service);
                debug!(account, region, service = ?scope.service, ?hint, "unstaged all");
                (Response::Ok, self.shutdown_if_empty(&registry, hint))
            }

            Verb::Drain { keep } => {
                let slice = registry.slice(account, region, scope.service);
                if !keep {
                    registry.clear(account, region, scope.service);
                }
                debug!(account, region, service = ?scope.service, keep, "drained state");
                (Response::State(slice), None)
            }

            Verb::WriteState { state } => {
                registry.replace(account, region, scope.service, state);
                debug!(account, region, service = ?scope.service, "wrote state");
                (Response::Ok, None)
            }
        }
    }

    fn shutdown_if_empty(&self, registry: &Registry, hint: Option<Hint>) -> Option<Shutdown> {
        if !self.manual && registry.is_empty() {
            Some(Shutdown { hint })
        } else {
            None
        }
    }
}

fn service_required(verb: &str) -> Response {
    Response::error(
        ErrorCode::InvalidScope,
        format!("{verb} requires a concrete service scope"),
    )
}
