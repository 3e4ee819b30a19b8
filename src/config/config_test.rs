use serial_test::serial;
use temp_env::with_vars;

use super::*;

fn cleanup_all_biblio_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("BIBLIO__") {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = EngineConfig::default();

    assert_eq!(config.circulation.loan_period_days, 14);
    assert_eq!(config.circulation.extension_days, 7);
    assert_eq!(config.circulation.max_extensions, 1);
    assert_eq!(config.auth.max_login_failures, 3);
    assert_eq!(config.auth.lockout_secs, 300);
    assert_eq!(config.dispatch.broadcast_batch_size, 50);
    assert_eq!(config.dispatch.individual_rate_per_sec, 10);
    assert_eq!(config.dispatch.broadcast_rate_per_min, 1);
    assert_eq!(config.scheduler.due_soon_lookahead_days, 2);
    assert_eq!(config.store.backup_retention_days, 30);
    assert_eq!(config.retry.transport.max_retries, 2);
    assert_eq!(config.retry.transport.base_delay_ms, 30_000);
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_biblio_env_vars();
    with_vars(vec![("BIBLIO__DISPATCH__BROADCAST_BATCH_SIZE", Some("25"))], || {
        let config = EngineConfig::new().unwrap();

        assert_eq!(config.dispatch.broadcast_batch_size, 25);
        // Untouched sections keep their defaults.
        assert_eq!(config.circulation.loan_period_days, 14);
    });
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_biblio_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("dynamic_config.toml");

    std::fs::write(
        &config_path,
        r#"
        [store]
        backup_retention_days = 7

        [circulation]
        loan_period_days = 21

        [circulation.borrow_limits]
        standard = 2
        premium = 4
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = EngineConfig::new().expect("success");
        let result = base_config.with_override_config(config_path.to_str().unwrap());

        assert!(result.is_ok());
        let config = result.unwrap();

        assert_eq!(config.store.backup_retention_days, 7);
        assert_eq!(config.circulation.loan_period_days, 21);
        assert_eq!(config.circulation.borrow_limits.get("standard"), Some(&2));
        assert_eq!(config.circulation.borrow_limits.get("premium"), Some(&4));
    });
}

#[test]
fn validation_should_fail_with_zero_loan_period() {
    let mut config = EngineConfig::default();
    config.circulation.loan_period_days = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_fail_with_empty_limit_table() {
    let mut config = EngineConfig::default();
    config.circulation.borrow_limits.clear();
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_fail_with_zero_workers() {
    let mut config = EngineConfig::default();
    config.dispatch.worker_count = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_fail_with_zero_lockout() {
    let mut config = EngineConfig::default();
    config.auth.lockout_secs = 0;
    assert!(config.validate().is_err());
}
