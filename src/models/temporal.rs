//! Shared timestamp helper for bitemporal rows.
//!
//! `Entity` and `Relation` store their valid-time window directly as
//! `valid_from`/`valid_to` `i64` columns rather than through an interval
//! type; this function is the single place that reads the wall clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current Unix timestamp in seconds.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn current_timestamp() -> i64 {
    // Cast is safe: u64::MAX seconds won't occur until year 292277026596
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
