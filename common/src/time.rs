//! Epoch-second timestamps (spec §3: "seconds since epoch" throughout).

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as seconds since the Unix epoch.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
