use chrono::DateTime;
use chrono::Utc;

/// return millisecond timestamp of `at`
pub(crate) fn millis_of(at: &DateTime<Utc>) -> u64 {
    at.timestamp_millis().max(0) as u64
}

/// return second
pub(crate) fn unix_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
