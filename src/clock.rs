//! Time sources.
//!
//! Monotonic nanoseconds (process epoch) stamp order arrival for
//! tie-breaking and audit; wall-clock strings feed diagnostic output.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds since the process epoch. Monotonic, never wall-adjusted.
pub fn monotonic_ns() -> u64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Human-readable wall-clock stamp for diagnostic snapshots.
pub fn wall_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
