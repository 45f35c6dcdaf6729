//! Display formatting for accrued durations

/// Render a millisecond count as `"Xh Ym Zs"`.
///
/// Hours are not wrapped, so long totals read as e.g. `"136h 4m 9s"`.
#[must_use]
pub fn format_duration(millis: u64) -> String {
    let total_seconds = millis / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{hours}h {minutes}m {seconds}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0h 0m 0s");
        assert_eq!(format_duration(999), "0h 0m 0s");
        assert_eq!(format_duration(1_000), "0h 0m 1s");
        assert_eq!(format_duration(61_000), "0h 1m 1s");
        assert_eq!(format_duration(3_661_000), "1h 1m 1s");
    }

    #[test]
    fn test_format_duration_does_not_wrap_hours() {
        // 5 days, 16 hours
        assert_eq!(format_duration(489_600_000), "136h 0m 0s");
    }
}
