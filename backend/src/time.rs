use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. All engine timestamps are epoch-ms i64;
/// conversion to human-readable form happens at the API edge only.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Render an epoch-ms timestamp as an RFC 3339 UTC string.
/// Returns None for timestamps outside chrono's representable range.
pub fn ms_to_rfc3339(ms: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339())
}
