use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;

use super::policy::CirculationPolicy;
use crate::CirculationConfig;

#[test]
fn borrow_limit_reads_the_table() {
    let policy = CirculationPolicy::from_config(&CirculationConfig::default());
    assert_eq!(policy.borrow_limit("standard"), 5);
    assert_eq!(policy.borrow_limit("premium"), 10);
}

#[test]
fn unknown_status_is_denied_by_default() {
    let policy = CirculationPolicy::from_config(&CirculationConfig::default());
    assert_eq!(policy.borrow_limit("guest"), 0);
    assert_eq!(policy.borrow_limit(""), 0);
}

#[test]
fn due_date_applies_the_loan_period() {
    let policy = CirculationPolicy::from_config(&CirculationConfig::default());
    let borrowed = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    assert_eq!(policy.due_date(borrowed), borrowed + Duration::days(14));
}

#[test]
fn extension_window_comes_from_config() {
    let mut config = CirculationConfig::default();
    config.extension_days = 3;
    config.max_extensions = 2;
    let policy = CirculationPolicy::from_config(&config);
    assert_eq!(policy.extension(), Duration::days(3));
    assert_eq!(policy.max_extensions(), 2);
}
