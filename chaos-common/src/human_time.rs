//! Human-readable time formatting
//!
//! Chat users give song start offsets as `m:ss`; the same notation is used
//! when echoing accepted offsets back and in log lines.

/// Convert a `minutes:seconds` pair to absolute seconds
pub fn minutes_seconds_to_secs(minutes: u32, seconds: u32) -> u32 {
    minutes * 60 + seconds
}

/// Format seconds as `M:SS`
///
/// # Examples
///
/// ```
/// use chaos_common::human_time::format_minutes_seconds;
///
/// assert_eq!(format_minutes_seconds(90), "1:30");
/// assert_eq!(format_minutes_seconds(5), "0:05");
/// assert_eq!(format_minutes_seconds(3725), "62:05");
/// ```
pub fn format_minutes_seconds(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Format a fractional duration in seconds, picking a unit by magnitude
///
/// Used for log output (song lengths, rebuild durations).
///
/// # Examples
///
/// ```
/// use chaos_common::human_time::format_duration_secs;
///
/// assert_eq!(format_duration_secs(0.25), "250ms");
/// assert_eq!(format_duration_secs(42.0), "42.00s");
/// assert_eq!(format_duration_secs(150.0), "2:30");
/// ```
pub fn format_duration_secs(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 100.0 {
        format!("{:.2}s", secs)
    } else {
        format_minutes_seconds(secs.round() as u32)
    }
}
