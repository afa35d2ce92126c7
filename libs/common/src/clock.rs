//! Wall-clock helpers shared by the HTTP and realtime paths.

use chrono::Utc;

/// Current time as whole seconds since the Unix epoch.
///
/// Transcript timestamps use this unit when the client does not supply one.
pub fn unix_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Resolve a client-supplied timestamp, treating absent or zero as "now".
pub fn or_now(timestamp: Option<i64>) -> i64 {
    match timestamp {
        Some(ts) if ts != 0 => ts,
        _ => unix_seconds(),
    }
}
