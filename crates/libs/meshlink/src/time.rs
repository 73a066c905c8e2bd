//! Process-local monotonic clock.
//!
//! Heartbeat timestamps are only ever interpreted by the process that
//! generated them (a pong echoes the ping's timestamp verbatim), so the
//! epoch is arbitrary and per-process.

use std::sync::OnceLock;
use std::time::Instant;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Milliseconds elapsed on the monotonic clock since this process first
/// asked for the time.
pub fn monotonic_millis() -> u64 {
    u64::try_from(epoch().elapsed().as_millis()).unwrap_or(u64::MAX)
}
