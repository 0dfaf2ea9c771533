//! Time-related utilities for connection timestamps and display.

use chrono::{DateTime, TimeZone, Utc};

/// Get current Unix timestamp in milliseconds (UTC)
pub fn now_unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix timestamp (milliseconds) to an RFC 3339 string (UTC)
pub fn millis_to_rfc3339(timestamp_millis: i64) -> String {
    let seconds = timestamp_millis / 1000;
    let nanos = ((timestamp_millis % 1000) * 1_000_000) as u32;
    let dt: DateTime<Utc> = Utc
        .timestamp_opt(seconds, nanos)
        .single()
        .unwrap_or_default();
    dt.to_rfc3339()
}
