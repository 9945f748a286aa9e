//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current wall-clock time in the device's timezone
///
/// Schedules are expressed in local time, so the power pipeline evaluates
/// against this rather than UTC.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Seconds since the Unix epoch, with sub-second precision
pub fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}
