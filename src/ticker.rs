use std::time::Duration;

/// Focus timer tick interval in milliseconds
pub const FOCUS_TICK_MS: u64 = 1000;

/// Get tick duration for driving the focus timer
pub fn tick_duration() -> Duration {
    Duration::from_millis(FOCUS_TICK_MS)
}

/// Format remaining seconds as "MM:SS"
pub fn format_countdown(remaining_seconds: i64) -> String {
    let remaining = remaining_seconds.max(0);
    format!("{:02}:{:02}", remaining / 60, remaining % 60)
}
