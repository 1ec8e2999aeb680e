use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current time in seconds since the Unix epoch
pub fn current_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Compute a departure timestamp `seconds` from now. Used by callers that
/// schedule flights relative to wall-clock time.
pub fn departure_in(seconds: u64) -> u64 {
    current_time() + seconds
}

/// Seconds elapsed since `timestamp`, or 0 if the timestamp is in the future
pub fn time_since(timestamp: u64) -> u64 {
    let now = current_time();
    now.saturating_sub(timestamp)
}
