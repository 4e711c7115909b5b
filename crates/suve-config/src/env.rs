//! Environment flags.

/// Set to `"0"` to disable daemon auto-start on the client side and
/// auto-shutdown on the daemon side.
pub const DAEMON_AUTO_START_ENV: &str = "SUVE_DAEMON_AUTO_START";

/// Whether the daemon lifecycle is automatic (the default).
///
/// Any value other than the literal `"0"` leaves automation on.
pub fn auto_start_enabled() -> bool {
    std::env::var(DAEMON_AUTO_START_ENV).map_or(true, |v| v != "0")
}
