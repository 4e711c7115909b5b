//! Backend factory: binds the file/agent choice into store handles.
//!
//! The rest of the engine programs against `ServiceStore` and
//! `GlobalStore`; this is the one place that knows which backend is in
//! play for a session.

use std::path::PathBuf;

use suve_client::{AgentClient, AgentStore};
use suve_config::StateTree;
use suve_store::{FileStore, GlobalStore, ServiceStore};
use suve_types::Service;

use crate::SuveError;

/// Which backend a session stages into.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Per-service encrypted files under the state tree.
    File {
        /// Defaults to `~/.suve` when `None`.
        root: Option<PathBuf>,
        passphrase: Option<String>,
    },
    /// The long-running agent daemon.
    Agent {
        /// Defaults to the platform socket path when `None`.
        socket: Option<PathBuf>,
    },
}

/// Store handles for one (account, region) namespace.
pub struct Stores {
    pub global: Box<dyn GlobalStore>,
    pub param: Box<dyn ServiceStore>,
    pub secret: Box<dyn ServiceStore>,
}

impl Stores {
    pub fn service(&self, service: Service) -> &dyn ServiceStore {
        match service {
            Service::Param => self.param.as_ref(),
            Service::Secret => self.secret.as_ref(),
        }
    }
}

/// Builds the three handles for a backend choice.
pub fn open_stores(
    backend: &Backend,
    account: &str,
    region: &str,
) -> Result<Stores, SuveError> {
    match backend {
        Backend::File { root, passphrase } => {
            let tree = match root {
                Some(root) => StateTree::with_root(root),
                None => StateTree::new()?,
            };
            let mut store = FileStore::new(tree, account, region);
            if let Some(passphrase) = passphrase {
                store = store.with_passphrase(passphrase.clone());
            }
            Ok(Stores {
                global: Box::new(store.clone()),
                param: Box::new(store.scoped(Service::Param)),
                secret: Box::new(store.scoped(Service::Secret)),
            })
        }
        Backend::Agent { socket } => {
            let client = match socket {
                Some(socket) => AgentClient::new(socket),
                None => AgentClient::from_env().map_err(|e| {
                    SuveError::Store(suve_store::StoreError::Agent(e.to_string()))
                })?,
            };
            let store = AgentStore::new(client, account, region);
            Ok(Stores {
                global: Box::new(store.clone()),
                param: Box::new(store.scoped(Service::Param)),
                secret: Box::new(store.scoped(Service::Secret)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn file_backend_handles_share_one_tree() {
        let temp = TempDir::new().unwrap();
        let backend = Backend::File {
            root: Some(temp.path().to_path_buf()),
            passphrase: None,
        };
        let stores = open_stores(&backend, "123456789012", "us-east-1").unwrap();

        stores
            .service(Service::Param)
            .stage_entry(
                "/a",
                suve_types::Entry::create(
                    "v1".into(),
                    None,
                    "2024-03-01T10:00:00Z".parse().unwrap(),
                ),
            )
            .unwrap();

        let all = stores.global.list().unwrap();
        assert_eq!(all.entry_count(), 1);
        assert_eq!(stores.param.service(), Service::Param);
        assert_eq!(stores.secret.service(), Service::Secret);
    }
}
