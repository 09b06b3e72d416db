//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in UTC (milliseconds)
    fn now_millis(&self) -> i64;

    /// Current time as an ISO 8601 string with millisecond precision and a `Z` suffix
    fn now_iso8601(&self) -> String {
        millis_to_iso8601(self.now_millis())
    }
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Convert a Unix timestamp (milliseconds) to `YYYY-MM-DDTHH:MM:SS.sssZ`.
///
/// Out-of-range values fall back to the Unix epoch.
pub fn millis_to_iso8601(timestamp_millis: i64) -> String {
    let dt = Utc
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .unwrap_or_default();
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render an RFC 3339 timestamp as local wall-clock time (`HH:MM`).
///
/// Returns `None` when the input is not RFC 3339.
pub fn rfc3339_to_local_hm(timestamp: &str) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(timestamp).ok()?;
    Some(parsed.with_timezone(&Local).format("%H:%M").to_string())
}

/// Render a Unix timestamp (milliseconds) as local wall-clock time (`HH:MM`).
pub fn millis_to_local_hm(timestamp_millis: i64) -> Option<String> {
    let dt = Local.timestamp_millis_opt(timestamp_millis).single()?;
    Some(dt.format("%H:%M").to_string())
}
