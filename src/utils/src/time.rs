use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// current timestamp
pub fn now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}

/// now_millis returns the current Unix time in milliseconds.
pub fn now_millis() -> i64 {
    now().as_millis() as i64
}

pub fn unix_millis_to_time(unix_millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(unix_millis)
}

/// time_format renders a millisecond timestamp as `%Y-%m-%d %H:%M:%S`, falling back to
/// the raw number when it is out of chrono's range.
pub fn time_format(unix_millis: i64) -> String {
    match unix_millis_to_time(unix_millis) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => unix_millis.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::time::{now_millis, time_format};

    #[test]
    fn test_time_format() {
        assert_eq!(time_format(0), "1970-01-01 00:00:00");
        assert_eq!(time_format(1_814_400_000), "1970-01-22 00:00:00");
        assert_eq!(time_format(i64::MAX), i64::MAX.to_string());
    }

    #[test]
    fn test_now_millis() {
        assert!(now_millis() > 1_600_000_000_000);
    }
}
