//! File-backed state storage.
//!
//! One JSON file per (account, region, service). Mutations run under two
//! layers of exclusion: a process-wide mutex (so threads sharing one
//! process never race, even on a shared descriptor) and an exclusive OS
//! lock on a `.lock` sibling (so concurrent processes serialize). Both
//! are held for the whole read–modify–write sequence.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use fs2::FileExt;
use suve_config::StateTree;
use suve_types::{Cancel, Entry, Hint, Service, State, TagEntry};
use tracing::{debug, warn};

use crate::facade::{GlobalStore, ServiceStore};
use crate::StoreError;

/// Default process-wide mutex shared by every [`FileStore`] in the
/// process. Injectable per store for tests.
static PROCESS_MUTEX: LazyLock<Arc<Mutex<()>>> = LazyLock::new(|| Arc::new(Mutex::new(())));

/// File backend for one (account, region) namespace.
///
/// Cloning is cheap and shares the process mutex and cancel token.
#[derive(Debug, Clone)]
pub struct FileStore {
    tree: StateTree,
    account: String,
    region: String,
    passphrase: Option<String>,
    cancel: Cancel,
    process_mutex: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(tree: StateTree, account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            tree,
            account: account.into(),
            region: region.into(),
            passphrase: None,
            cancel: Cancel::new(),
            process_mutex: Arc::clone(&PROCESS_MUTEX),
        }
    }

    /// Encrypt state files under `passphrase` on save, and require it on
    /// load of encrypted files.
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_cancel(mut self, cancel: Cancel) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replaces the process-wide mutex. Tests use this to isolate stores
    /// from each other.
    pub fn with_process_mutex(mut self, mutex: Arc<Mutex<()>>) -> Self {
        self.process_mutex = mutex;
        self
    }

    /// A handle scoped to one service.
    pub fn scoped(&self, service: Service) -> FileServiceStore {
        FileServiceStore {
            store: self.clone(),
            service,
        }
    }

    // ========================================================================
    // Load / save
    // ========================================================================

    fn load_service(&self, service: Service) -> Result<State, StoreError> {
        let path = self.tree.state_file(&self.account, &self.region, service);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            // The file's absence IS the empty state.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(State::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let plaintext = if suve_crypto::is_encrypted(&bytes) {
            let passphrase = self
                .passphrase
                .as_deref()
                .ok_or(StoreError::DecryptionFailed)?;
            suve_crypto::open(&bytes, passphrase).map_err(|_| StoreError::DecryptionFailed)?
        } else {
            bytes
        };

        let state: State = serde_json::from_slice(&plaintext)
            .map_err(|source| StoreError::Parse { path, source })?;
        Ok(state.migrate()?)
    }

    fn save_service(&self, service: Service, state: &State) -> Result<(), StoreError> {
        let path = self.tree.state_file(&self.account, &self.region, service);

        if state.is_empty() {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed empty state file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(StoreError::Io { path, source }),
            }
            return Ok(());
        }

        let json = serde_json::to_vec_pretty(state)
            .map_err(|source| StoreError::Parse { path: path.clone(), source })?;
        let bytes = match &self.passphrase {
            Some(passphrase) => {
                suve_crypto::seal(&json, passphrase).map_err(|_| StoreError::EncryptionFailed)?
            }
            None => json,
        };

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&path)
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;
        // One write of the complete payload: a reader sees either the old
        // content or the new one outside of abnormal termination.
        file.write_all(&bytes)
            .map_err(|source| StoreError::Io { path, source })?;
        Ok(())
    }

    // ========================================================================
    // Locked read–modify–write
    // ========================================================================

    fn mutate<T>(
        &self,
        service: Service,
        f: impl FnOnce(&mut State) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if self.cancel.is_canceled() {
            return Err(StoreError::Canceled);
        }

        let _process = self
            .process_mutex
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.tree
            .ensure_service_dir(&self.account, &self.region, service)
            .map_err(config_to_io)?;

        let lock_path = self.tree.lock_file(&self.account, &self.region, service);
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| StoreError::Io { path: lock_path.clone(), source })?;
        lock_file
            .lock_exclusive()
            .map_err(|source| StoreError::LockFailed { path: lock_path.clone(), source })?;

        let result = (|| {
            let mut state = self.load_service(service)?;
            let out = f(&mut state)?;
            self.save_service(service, &state)?;
            Ok(out)
        })();

        // Best-effort: the lock also dies with the descriptor.
        if let Err(e) = FileExt::unlock(&lock_file) {
            warn!(path = %lock_path.display(), error = %e, "failed to release file lock");
        }

        result
    }
}

fn config_to_io(e: suve_config::ConfigError) -> StoreError {
    match e {
        suve_config::ConfigError::CreateDir { path, source } => StoreError::Io { path, source },
        other => StoreError::Io {
            path: std::path::PathBuf::new(),
            source: std::io::Error::other(other.to_string()),
        },
    }
}

// ============================================================================
// Service-scoped handle
// ============================================================================

/// [`ServiceStore`] over one service's file.
#[derive(Debug, Clone)]
pub struct FileServiceStore {
    store: FileStore,
    service: Service,
}

impl ServiceStore for FileServiceStore {
    fn service(&self) -> Service {
        self.service
    }

    fn get_entry(&self, name: &str) -> Result<Option<Entry>, StoreError> {
        let state = self.store.load_service(self.service)?;
        Ok(state.entry(self.service, name).cloned())
    }

    fn get_tag(&self, name: &str) -> Result<Option<TagEntry>, StoreError> {
        let state = self.store.load_service(self.service)?;
        Ok(state.tag(self.service, name).cloned())
    }

    fn list_entries(&self) -> Result<std::collections::BTreeMap<String, Entry>, StoreError> {
        let state = self.store.load_service(self.service)?;
        Ok(state.list_entries(self.service))
    }

    fn list_tags(&self) -> Result<std::collections::BTreeMap<String, TagEntry>, StoreError> {
        let state = self.store.load_service(self.service)?;
        Ok(state.list_tags(self.service))
    }

    fn stage_entry(&self, name: &str, entry: Entry) -> Result<(), StoreError> {
        let service = self.service;
        self.store.mutate(service, |state| {
            state.set_entry(service, name, entry);
            Ok(())
        })
    }

    fn stage_tag(&self, name: &str, tag: TagEntry) -> Result<(), StoreError> {
        let service = self.service;
        self.store.mutate(service, |state| {
            state.set_tag(service, name, tag);
            Ok(())
        })
    }

    fn unstage_entry(&self, name: &str, hint: Option<Hint>) -> Result<(), StoreError> {
        let service = self.service;
        self.store.mutate(service, |state| {
            state
                .remove_entry(service, name)
                .ok_or_else(|| StoreError::NotStaged { name: name.to_string() })?;
            debug!(?hint, name, "unstaged entry");
            Ok(())
        })
    }

    fn unstage_tag(&self, name: &str, hint: Option<Hint>) -> Result<(), StoreError> {
        let service = self.service;
        self.store.mutate(service, |state| {
            state
                .remove_tag(service, name)
                .ok_or_else(|| StoreError::NotStaged { name: name.to_string() })?;
            debug!(?hint, name, "unstaged tag");
            Ok(())
        })
    }

    fn drain(&self, keep: bool) -> Result<State, StoreError> {
        let service = self.service;
        self.store.mutate(service, |state| {
            let out = state.clone();
            if !keep {
                // Saving the emptied state removes the file.
                *state = State::new();
            }
            Ok(out)
        })
    }

    fn write_state(&self, state: State) -> Result<(), StoreError> {
        let service = self.service;
        self.store.mutate(service, |current| {
            *current = state.extract_service(service);
            Ok(())
        })
    }
}

// ============================================================================
// Global view
// ============================================================================

impl GlobalStore for FileStore {
    fn list(&self) -> Result<State, StoreError> {
        let mut out = State::new();
        for service in Service::ALL {
            out = out.merged(self.load_service(service)?);
        }
        Ok(out)
    }

    fn unstage_all(&self, hint: Option<Hint>) -> Result<(), StoreError> {
        for service in Service::ALL {
            self.mutate(service, |state| {
                *state = State::new();
                Ok(())
            })?;
        }
        debug!(?hint, "unstaged everything");
        Ok(())
    }

    fn drain(&self, keep: bool) -> Result<State, StoreError> {
        let mut out = State::new();
        for service in Service::ALL {
            let drained = self.mutate(service, |state| {
                let out = state.clone();
                if !keep {
                    *state = State::new();
                }
                Ok(out)
            })?;
            out = out.merged(drained);
        }
        Ok(out)
    }

    fn write_state(&self, state: State) -> Result<(), StoreError> {
        for service in Service::ALL {
            let slice = state.extract_service(service);
            self.mutate(service, |current| {
                *current = slice;
                Ok(())
            })?;
        }
        Ok(())
    }
}
