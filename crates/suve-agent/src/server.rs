//! Socket server and daemon lifecycle.

use std::fs::OpenOptions;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;

use fs2::FileExt;
use suve_wire::{Request, WireError, read_frame, write_frame};
use tracing::{debug, info, warn};

use crate::error::{AgentError, AgentResult};
use crate::handler::Handler;

pub use crate::handler::Shutdown;

/// Where the daemon listens and how it behaves on empty state.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path of the unix socket.
    pub socket_path: PathBuf,
    /// Path of the lock file keeping the daemon exclusive per user.
    pub lock_path: PathBuf,
    /// Manual mode: never exit when the staged set becomes empty.
    pub manual: bool,
}

impl ServerConfig {
    /// Platform defaults plus the `SUVE_DAEMON_AUTO_START` flag.
    pub fn from_env() -> AgentResult<Self> {
        Ok(Self {
            socket_path: suve_config::socket_path()?,
            lock_path: suve_config::agent_lock_path()?,
            manual: !suve_config::auto_start_enabled(),
        })
    }
}

/// The agent daemon: binds the socket, then serves connections one at a
/// time until a successful unstage empties the staged set.
pub struct Server {
    config: ServerConfig,
    handler: Handler,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let handler = Handler::new(config.manual);
        Self { config, handler }
    }

    /// Runs the daemon to completion.
    ///
    /// Startup order matters: the lock comes first (a second daemon exits
    /// cleanly instead of stealing the socket), the stale socket file is
    /// removed next, and the listener is bound last. Returns when
    /// auto-shutdown triggers; the caller prints the exit line.
    pub fn run(&self) -> AgentResult<Shutdown> {
        if let Some(dir) = self.config.socket_path.parent() {
            suve_config::create_private_dir(dir)?;
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.config.lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(AgentError::AlreadyRunning(self.config.lock_path.clone()));
        }

        if self.config.socket_path.exists() {
            std::fs::remove_file(&self.config.socket_path)?;
        }
        let listener = UnixListener::bind(&self.config.socket_path).map_err(|source| {
            AgentError::BindFailed {
                path: self.config.socket_path.clone(),
                source,
            }
        })?;

        info!(socket = %self.config.socket_path.display(), manual = self.config.manual, "agent started");

        let shutdown = self.serve(&listener);

        if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
            warn!(error = %e, "failed to remove socket file");
        }
        info!(line = shutdown.exit_line(), "agent exiting");
        // The lock file is released when lock_file drops.
        Ok(shutdown)
    }

    fn serve(&self, listener: &UnixListener) -> Shutdown {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(shutdown) = self.serve_connection(stream) {
                        return shutdown;
                    }
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            }
        }
        unreachable!("incoming() iterates forever")
    }

    /// Serves one connection until the client hangs up. Returns `Some`
    /// when a verb emptied the staged set and the daemon must exit.
    fn serve_connection(&self, mut stream: UnixStream) -> Option<Shutdown> {
        loop {
            let request: Request = match read_frame(&mut stream) {
                Ok(request) => request,
                Err(WireError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "dropping connection on malformed frame");
                    return None;
                }
            };

            let (response, shutdown) = self.handler.handle(request);

            // Reply before exiting so the triggering client sees success.
            if let Err(e) = write_frame(&mut stream, &response) {
                warn!(error = %e, "failed to write response");
                return shutdown;
            }
            if shutdown.is_some() {
                return shutdown;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use suve_types::{Entry, Hint, Service};
    use suve_wire::{Response, Scope, Verb};
    use tempfile::TempDir;

    use super::*;

    fn ts(s: &str) -> suve_types::Timestamp {
        s.parse().unwrap()
    }

    fn request(stream: &mut UnixStream, scope: Scope, verb: Verb) -> Response {
        write_frame(stream, &Request { scope, verb }).unwrap();
        read_frame(stream).unwrap()
    }

    fn connect(path: &std::path::Path) -> UnixStream {
        for _ in 0..50 {
            if let Ok(stream) = UnixStream::connect(path) {
                return stream;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("agent never came up at {}", path.display());
    }

    #[test]
    fn serves_verbs_and_exits_on_empty() {
        let temp = TempDir::new().unwrap();
        let config = ServerConfig {
            socket_path: temp.path().join("agent.sock"),
            lock_path: temp.path().join("agent.lock"),
            manual: false,
        };
        let socket_path = config.socket_path.clone();

        let server = std::thread::spawn(move || Server::new(config).run().unwrap());

        let mut stream = connect(&socket_path);
        let scope = Scope::service("123456789012", "us-east-1", Service::Param);

        let response = request(
            &mut stream,
            scope.clone(),
            Verb::StageEntry {
                name: "/a".into(),
                entry: Entry::create("v1".into(), None, ts("2024-03-01T10:00:00Z")),
            },
        );
        assert_eq!(response, Response::Ok);

        let response = request(
            &mut stream,
            scope.clone(),
            Verb::UnstageEntry {
                name: "/a".into(),
                hint: Some(Hint::Reset),
            },
        );
        assert_eq!(response, Response::Ok);

        let shutdown = server.join().unwrap();
        assert_eq!(shutdown.exit_line(), "all changes unstaged");
        assert!(!socket_path.exists(), "socket file must be cleaned up");
    }

    #[test]
    fn second_daemon_fails_to_start() {
        let temp = TempDir::new().unwrap();
        let config = ServerConfig {
            socket_path: temp.path().join("agent.sock"),
            lock_path: temp.path().join("agent.lock"),
            manual: false,
        };
        let socket_path = config.socket_path.clone();

        let first = {
            let config = config.clone();
            std::thread::spawn(move || Server::new(config).run().unwrap())
        };
        let mut stream = connect(&socket_path);

        let second = Server::new(config).run();
        assert!(matches!(second, Err(AgentError::AlreadyRunning(_))));

        // Empty the first daemon so its thread exits.
        let scope = Scope::service("a", "r", Service::Param);
        let response = request(
            &mut stream,
            scope.clone(),
            Verb::StageEntry {
                name: "/a".into(),
                entry: Entry::create("v1".into(), None, ts("2024-03-01T10:00:00Z")),
            },
        );
        assert_eq!(response, Response::Ok);
        request(&mut stream, Scope::global("a", "r"), Verb::UnstageAll { hint: None });
        first.join().unwrap();
    }
}
