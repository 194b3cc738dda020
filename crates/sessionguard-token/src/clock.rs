//! Wall-clock helper

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in whole seconds since the Unix epoch
///
/// A clock set before 1970 reads as 0.
#[must_use]
pub fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
