//! suve agent daemon.
//!
//! Holds staged changes in memory for every suve invocation of one user.
//! Normally started on demand by the client library and left to exit on
//! its own once nothing is staged.
//!
//! ```bash
//! # Run attached to the terminal with a custom socket
//! suve-agent --socket /tmp/suve-test/agent.sock --foreground --manual
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use suve_agent::{Server, ServerConfig};
use tracing_subscriber::EnvFilter;

/// Long-running suve agent holding staged changes in memory.
#[derive(Parser)]
#[command(name = "suve-agent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Socket path override (defaults to the per-user runtime directory).
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Lock file override.
    #[arg(long)]
    lock: Option<PathBuf>,

    /// Stay attached to the terminal and log to stderr instead of the
    /// agent log file beside the socket.
    #[arg(long)]
    foreground: bool,

    /// Never exit when the staged set becomes empty.
    #[arg(long)]
    manual: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = ServerConfig::from_env()?;
    if let Some(socket) = cli.socket {
        // The lock defaults to a sibling of the socket so an override
        // relocates both together.
        config.lock_path = socket
            .parent()
            .map_or_else(|| PathBuf::from("agent.lock"), |dir| dir.join("agent.lock"));
        config.socket_path = socket;
    }
    if let Some(lock) = cli.lock {
        config.lock_path = lock;
    }
    config.manual = config.manual || cli.manual;

    init_logging(cli.foreground, &config.socket_path);
    spawn_signal_handler();

    let shutdown = Server::new(config).run()?;
    println!("{}", shutdown.exit_line());
    Ok(())
}

/// Foreground runs log to stderr. A daemon spawned by the client has its
/// stdio nulled, so the default appends to `agent.log` beside the socket;
/// stderr remains the fallback when the log file cannot be opened.
fn init_logging(foreground: bool, socket_path: &Path) {
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !foreground {
        if let Some(dir) = socket_path.parent() {
            let _ = suve_config::create_private_dir(dir);
        }
        let log_path = socket_path.with_file_name("agent.log");
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(std::sync::Arc::new(file))
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Exits on SIGTERM/SIGINT without persisting anything: once the agent is
/// the source of truth, callers are responsible for draining state back
/// to the file backend before terminating it.
#[cfg(unix)]
fn spawn_signal_handler() {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            std::thread::spawn(move || {
                if signals.forever().next().is_some() {
                    tracing::info!("termination signal received; exiting without persisting");
                    std::process::exit(0);
                }
            });
        }
        Err(e) => tracing::warn!(error = %e, "failed to register signal handler"),
    }
}

#[cfg(not(unix))]
fn spawn_signal_handler() {}
