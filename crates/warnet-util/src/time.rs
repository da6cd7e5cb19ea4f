//! Time helpers for warnetd
//!
//! Durable timestamps are wall-clock `DateTime<Local>` stored as RFC 3339
//! text. Usage counters are plain integer seconds advanced by the tick
//! loop, so no monotonic clock is needed here.

use chrono::{DateTime, Local};

/// Current local time. Single call site wrapper so the timestamp source
/// is easy to audit.
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Format a `DateTime` for log and journal display.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format a second count in human-readable form ("1h 1m 1s").
pub fn format_seconds(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Whole seconds elapsed between two wall-clock instants, floored at zero.
///
/// A negative elapsed time can only come from a clock step backwards
/// between daemon runs; treating it as zero keeps recovery from crediting
/// time that was never purchased.
pub fn elapsed_seconds(from: DateTime<Local>, to: DateTime<Local>) -> i64 {
    to.signed_duration_since(from).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(30), "30s");
        assert_eq!(format_seconds(90), "1m 30s");
        assert_eq!(format_seconds(3661), "1h 1m 1s");
        assert_eq!(format_seconds(-5), "0s");
    }

    #[test]
    fn test_elapsed_seconds() {
        let start = Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let end = Local.with_ymd_and_hms(2025, 6, 1, 13, 30, 0).unwrap();

        assert_eq!(elapsed_seconds(start, end), 5400);
        // Clock stepped backwards: floor at zero.
        assert_eq!(elapsed_seconds(end, start), 0);
    }

    #[test]
    fn test_format_datetime_full() {
        let dt = Local.with_ymd_and_hms(2025, 12, 25, 14, 30, 45).unwrap();
        assert_eq!(format_datetime_full(&dt), "2025-12-25 14:30:45");
    }

    #[test]
    fn test_now_advances() {
        let t1 = now();
        let t2 = now();
        assert!(t2 >= t1);
    }
}
