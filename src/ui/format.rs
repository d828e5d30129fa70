use chrono::{Local, TimeZone};
use std::time::Duration;

/// Renders a millisecond duration as `MM:SS`. Minutes are not folded into
/// hours, so a 65 minute track renders as `65:00`.
pub fn format_millis(millis: u64) -> String {
    let total_seconds = millis / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

pub fn format_duration(duration: Duration) -> String {
    format_millis(duration.as_millis() as u64)
}

/// Converts an epoch-millisecond timestamp to the local wall clock.
pub fn format_timestamp(epoch_millis: i64) -> String {
    match Local.timestamp_millis_opt(epoch_millis).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "unknown".to_string(),
    }
}

/// Date part of [`format_timestamp`], used for release dates.
pub fn format_date(epoch_millis: i64) -> String {
    match Local.timestamp_millis_opt(epoch_millis).single() {
        Some(time) => time.format("%Y-%m-%d").to_string(),
        None => "unknown".to_string(),
    }
}

pub fn format_size(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / 1_000_000.0)
}

/// Cuts `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
