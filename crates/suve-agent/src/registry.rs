//! In-memory state, one `State` per (account, region) namespace.

use std::collections::BTreeMap;

use suve_types::{Service, State};

/// The agent's authoritative copy of all staged state.
///
/// While the daemon runs, this map is the source of truth; the file
/// backend takes over once state is drained back out.
#[derive(Debug, Default)]
pub struct Registry {
    namespaces: BTreeMap<(String, String), State>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no namespace holds any pending change.
    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(State::is_empty)
    }

    pub fn state(&self, account: &str, region: &str) -> Option<&State> {
        self.namespaces.get(&(account.to_string(), region.to_string()))
    }

    pub fn state_mut(&mut self, account: &str, region: &str) -> &mut State {
        self.namespaces
            .entry((account.to_string(), region.to_string()))
            .or_default()
    }

    /// The namespace's state filtered to `service`, or the whole namespace
    /// when `service` is `None`.
    pub fn slice(&self, account: &str, region: &str, service: Option<Service>) -> State {
        let Some(state) = self.state(account, region) else {
            return State::new();
        };
        match service {
            Some(service) => state.extract_service(service),
            None => state.clone(),
        }
    }

    /// Clears the namespace's state for `service`, or entirely when
    /// `service` is `None`. Emptied namespaces are dropped.
    pub fn clear(&mut self, account: &str, region: &str, service: Option<Service>) {
        match service {
            Some(service) => {
                let state = self.state_mut(account, region);
                state.remove_service(service);
            }
            None => {
                *self.state_mut(account, region) = State::new();
            }
        }
        self.namespaces.retain(|_, state| !state.is_empty());
    }

    /// Replaces the namespace's state for `service` (or entirely) with the
    /// matching slice of `incoming`.
    pub fn replace(
        &mut self,
        account: &str,
        region: &str,
        service: Option<Service>,
        incoming: State,
    ) {
        let state = self.state_mut(account, region);
        match service {
            Some(service) => {
                state.remove_service(service);
                *state = std::mem::take(state).merged(incoming.extract_service(service));
            }
            None => *state = incoming,
        }
        self.namespaces.retain(|_, state| !state.is_empty());
    }
}
