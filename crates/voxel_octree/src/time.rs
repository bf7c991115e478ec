//! Microsecond timestamps for change tracking and scene pacing.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in microseconds since the epoch.
///
/// Change timestamps only ever compare against each other with
/// [`crate::constants::CHANGE_FUDGE_USECS`] slop, so wall-clock steps are
/// tolerable here.
pub fn timestamp_now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_micros() as u64)
    .unwrap_or(0)
}
