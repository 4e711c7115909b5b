//! Blocking client for the agent socket.

use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use suve_wire::{Request, Response, read_frame, write_frame};
use tracing::{debug, info};

use crate::ClientError;

/// Per-request socket timeout. Every verb is a memory operation on the
/// agent, so anything slower means a wedged daemon.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Auto-start connect retry schedule: exponential from 10ms capped at
/// 500ms, bounded by a total deadline.
const RETRY_INITIAL: Duration = Duration::from_millis(10);
const RETRY_MAX: Duration = Duration::from_millis(500);
const RETRY_DEADLINE: Duration = Duration::from_secs(3);

/// Client for one agent daemon, addressed by socket path.
///
/// Each request opens its own connection; the daemon serves them
/// serially, so no state is carried between calls.
#[derive(Debug, Clone)]
pub struct AgentClient {
    socket_path: PathBuf,
    auto_start: bool,
}

impl AgentClient {
    /// Client for the platform-default socket, honoring
    /// `SUVE_DAEMON_AUTO_START`.
    pub fn from_env() -> Result<Self, ClientError> {
        Ok(Self {
            socket_path: suve_config::socket_path()?,
            auto_start: suve_config::auto_start_enabled(),
        })
    }

    /// Client for an explicit socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            auto_start: suve_config::auto_start_enabled(),
        }
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// True when a daemon answers a ping. Never starts one.
    pub fn ping(&self) -> bool {
        let Ok(mut stream) = self.try_connect() else {
            return false;
        };
        let request = Request {
            scope: suve_wire::Scope::global("", ""),
            verb: suve_wire::Verb::Ping,
        };
        matches!(roundtrip(&mut stream, &request), Ok(Response::Pong { .. }))
    }

    /// Sends a read verb.
    ///
    /// Returns `Ok(None)` when no daemon is running and auto-start is
    /// disabled: reads report the empty state rather than spawning one.
    pub fn request_read(&self, request: &Request) -> Result<Option<Response>, ClientError> {
        match self.try_connect() {
            Ok(mut stream) => roundtrip(&mut stream, request).map(Some),
            Err(_) if !self.auto_start => Ok(None),
            Err(_) => {
                let mut stream = self.start_and_connect()?;
                roundtrip(&mut stream, request).map(Some)
            }
        }
    }

    /// Sends a write verb, starting the daemon first when necessary.
    ///
    /// In manual mode a missing daemon is a hard
    /// [`ClientError::DaemonUnavailable`].
    pub fn request_write(&self, request: &Request) -> Result<Response, ClientError> {
        match self.try_connect() {
            Ok(mut stream) => roundtrip(&mut stream, request),
            Err(_) if !self.auto_start => Err(ClientError::DaemonUnavailable),
            Err(_) => {
                let mut stream = self.start_and_connect()?;
                roundtrip(&mut stream, request)
            }
        }
    }

    fn try_connect(&self) -> Result<UnixStream, std::io::Error> {
        let stream = UnixStream::connect(&self.socket_path)?;
        stream.set_read_timeout(Some(REQUEST_TIMEOUT))?;
        stream.set_write_timeout(Some(REQUEST_TIMEOUT))?;
        Ok(stream)
    }

    /// Spawns the daemon detached, then retries the connect with bounded
    /// backoff until it answers or the deadline passes.
    fn start_and_connect(&self) -> Result<UnixStream, ClientError> {
        info!(socket = %self.socket_path.display(), "starting agent daemon");
        Command::new(agent_binary())
            .arg("--socket")
            .arg(&self.socket_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(ClientError::SpawnFailed)?;

        let deadline = Instant::now() + RETRY_DEADLINE;
        let mut delay = RETRY_INITIAL;
        loop {
            match self.try_connect() {
                Ok(stream) => return Ok(stream),
                Err(e) if Instant::now() >= deadline => {
                    debug!(error = %e, "agent never came up");
                    return Err(ClientError::DaemonUnavailable);
                }
                Err(_) => {
                    std::thread::sleep(delay);
                    delay = (delay * 2).min(RETRY_MAX);
                }
            }
        }
    }
}

fn roundtrip(stream: &mut UnixStream, request: &Request) -> Result<Response, ClientError> {
    write_frame(stream, request)?;
    Ok(read_frame(stream)?)
}

/// The daemon binary: a sibling of the running executable when present
/// (the installed layout), else whatever `suve-agent` resolves to on
/// `PATH`.
fn agent_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("suve-agent");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("suve-agent")
}
