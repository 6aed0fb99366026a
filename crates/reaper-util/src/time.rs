//! Time utilities for reaper
//!
//! Retention settings are expressed in whole minutes while node facts arrive
//! as `Duration`s; these helpers keep the two in step.

use chrono::{DateTime, Utc};
use std::time::Duration;

const SECS_PER_MINUTE: u64 = 60;

/// Duration of `n` whole minutes
pub const fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * SECS_PER_MINUTE)
}

/// Whole minutes contained in `d`, rounded down
pub fn whole_minutes(d: Duration) -> u64 {
    d.as_secs() / SECS_PER_MINUTE
}

/// Current wall-clock time in UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Add a std `Duration` to a wall-clock time.
///
/// Saturates at the latest representable instant instead of panicking on
/// absurdly large durations.
pub fn add_duration(at: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_minutes_roundtrip() {
        assert_eq!(minutes(0), Duration::ZERO);
        assert_eq!(minutes(15), Duration::from_secs(900));
        assert_eq!(whole_minutes(minutes(42)), 42);
    }

    #[test]
    fn test_whole_minutes_rounds_down() {
        assert_eq!(whole_minutes(Duration::from_secs(59)), 0);
        assert_eq!(whole_minutes(Duration::from_secs(119)), 1);
        assert_eq!(whole_minutes(Duration::from_millis(240_999)), 4);
    }

    #[test]
    fn test_add_duration() {
        let start = Utc.with_ymd_and_hms(2025, 12, 26, 15, 0, 0).unwrap();
        let later = add_duration(start, minutes(4));
        assert_eq!(later, Utc.with_ymd_and_hms(2025, 12, 26, 15, 4, 0).unwrap());
    }

    #[test]
    fn test_add_duration_saturates() {
        let start = Utc.with_ymd_and_hms(2025, 12, 26, 15, 0, 0).unwrap();
        assert_eq!(add_duration(start, Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn test_now_returns_time() {
        let before = Utc::now();
        let n = now();
        assert!(n >= before);
    }
}
