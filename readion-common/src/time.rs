//! Timestamp utilities

use chrono::{DateTime, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a stored millisecond timestamp back to UTC
///
/// Out-of-range values collapse to the Unix epoch rather than failing a read.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_from_millis_round_trips_now() {
        let timestamp = now();
        let restored = from_millis(timestamp.timestamp_millis());
        assert_eq!(restored.timestamp_millis(), timestamp.timestamp_millis());
    }

    #[test]
    fn test_from_millis_out_of_range_is_epoch() {
        assert_eq!(from_millis(i64::MAX), DateTime::<Utc>::default());
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::from_millis(0));
        assert_eq!(millis_to_duration(5000), Duration::from_secs(5));
    }
}
