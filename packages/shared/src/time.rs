//! Timestamp utilities.
//!
//! All timestamps exchanged over the wire are Unix timestamps in
//! milliseconds (UTC).

use chrono::{DateTime, Utc};

/// Get the current Unix timestamp in milliseconds (UTC).
pub fn now_unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a Unix timestamp in milliseconds to an RFC 3339 string (UTC).
///
/// Returns `None` if the timestamp is out of the representable range.
pub fn unix_millis_to_rfc3339(timestamp_millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_millis).map(|dt| dt.to_rfc3339())
}
