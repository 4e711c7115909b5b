//! State-tree and socket path discovery.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use suve_types::Service;

use crate::ConfigError;

/// Name of the per-service state file.
const STATE_FILE: &str = "stage.json";

/// The on-disk state tree: one file per (account, region, service).
///
/// Layout: `<root>/<account>/<region>/<service>/stage.json`, with a
/// `stage.json.lock` sibling used for cross-process exclusion. The root
/// defaults to `~/.suve` and is injectable for tests.
#[derive(Debug, Clone)]
pub struct StateTree {
    root: PathBuf,
}

impl StateTree {
    /// Discovers the default tree under the user's home directory.
    pub fn new() -> Result<Self, ConfigError> {
        let base = BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self {
            root: base.home_dir().join(".suve"),
        })
    }

    /// A tree rooted at an explicit directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one service's state file.
    pub fn service_dir(&self, account: &str, region: &str, service: Service) -> PathBuf {
        self.root
            .join(account)
            .join(region)
            .join(service.as_str())
    }

    /// Path of one service's state file.
    pub fn state_file(&self, account: &str, region: &str, service: Service) -> PathBuf {
        self.service_dir(account, region, service).join(STATE_FILE)
    }

    /// Path of the lock file guarding one service's state file.
    pub fn lock_file(&self, account: &str, region: &str, service: Service) -> PathBuf {
        let mut name = STATE_FILE.to_string();
        name.push_str(".lock");
        self.service_dir(account, region, service).join(name)
    }

    /// Creates the service directory, owner-only on unix.
    pub fn ensure_service_dir(
        &self,
        account: &str,
        region: &str,
        service: Service,
    ) -> Result<PathBuf, ConfigError> {
        let dir = self.service_dir(account, region, service);
        create_private_dir(&dir)?;
        Ok(dir)
    }
}

/// Directory holding the agent's socket and lock files.
///
/// First choice is `$XDG_RUNTIME_DIR/suve`; the fallback is a per-user
/// directory under `/tmp`.
pub fn socket_dir() -> Result<PathBuf, ConfigError> {
    let base = BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
    if let Some(runtime) = base.runtime_dir() {
        return Ok(runtime.join("suve"));
    }
    fallback_socket_dir(base.home_dir())
}

/// Path of the agent's unix socket.
pub fn socket_path() -> Result<PathBuf, ConfigError> {
    Ok(socket_dir()?.join("agent.sock"))
}

/// Path of the lock file that keeps the agent exclusive per user.
pub fn agent_lock_path() -> Result<PathBuf, ConfigError> {
    Ok(socket_dir()?.join("agent.lock"))
}

#[cfg(unix)]
fn fallback_socket_dir(home: &Path) -> Result<PathBuf, ConfigError> {
    use std::os::unix::fs::MetadataExt;

    // The home directory's owner is the user we are running as.
    let uid = std::fs::metadata(home).map(|m| m.uid()).unwrap_or(0);
    Ok(PathBuf::from(format!("/tmp/suve-{uid}")))
}

#[cfg(not(unix))]
fn fallback_socket_dir(_home: &Path) -> Result<PathBuf, ConfigError> {
    Err(ConfigError::NoRuntimeDir)
}

/// Creates `dir` (and parents) restricted to the owner on unix.
pub fn create_private_dir(dir: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        std::fs::set_permissions(dir, perms).map_err(|source| ConfigError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_state_tree_layout() {
        let tree = StateTree::with_root("/home/u/.suve");
        assert_eq!(
            tree.state_file("123456789012", "us-east-1", Service::Param),
            PathBuf::from("/home/u/.suve/123456789012/us-east-1/param/stage.json")
        );
        assert_eq!(
            tree.lock_file("123456789012", "us-east-1", Service::Secret),
            PathBuf::from("/home/u/.suve/123456789012/us-east-1/secret/stage.json.lock")
        );
    }

    #[test]
    fn test_ensure_service_dir_creates_owner_only() {
        let temp = tempdir().expect("tempdir");
        let tree = StateTree::with_root(temp.path());
        let dir = tree
            .ensure_service_dir("acct", "eu-west-1", Service::Param)
            .unwrap();
        assert!(dir.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_default_tree_lives_under_home() {
        if let Ok(tree) = StateTree::new() {
            assert!(tree.root().to_string_lossy().contains(".suve"));
        }
    }
}
