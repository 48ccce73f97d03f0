use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::ErrorCode;

fn cleanup_all_runtimevar_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("RUNTIMEVAR__") || key == CONFIG_PATH_ENV {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = RuntimeVarConfig::default();

    assert_eq!(config.backoff.base_delay_ms, 100);
    assert_eq!(config.backoff.max_delay_ms, 30_000);
    assert_eq!(config.backoff.multiplier, 2.0);
    assert_eq!(config.memory.long_poll_timeout_ms, 30_000);
    assert_eq!(config.file.poll_interval_ms, 1000);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_runtimevar_env_vars();
    with_vars(
        vec![
            ("RUNTIMEVAR__BACKOFF__MAX_DELAY_MS", Some("5000")),
            ("RUNTIMEVAR__FILE__POLL_INTERVAL_MS", Some("250")),
        ],
        || {
            let config = RuntimeVarConfig::new().unwrap();

            assert_eq!(config.backoff.max_delay_ms, 5000);
            assert_eq!(config.file.poll_interval_ms, 250);
            assert_eq!(config.backoff.base_delay_ms, 100);
        },
    );
}

#[test]
#[serial]
fn new_should_load_file_named_by_env() {
    cleanup_all_runtimevar_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("runtimevar.toml");
    std::fs::write(
        &config_path,
        r#"
        [backoff]
        base_delay_ms = 20
        multiplier = 1.5

        [memory]
        long_poll_timeout_ms = 500
        "#,
    )
    .unwrap();

    with_vars(vec![(CONFIG_PATH_ENV, Some(config_path.to_str().unwrap()))], || {
        let config = RuntimeVarConfig::new().unwrap().validate().unwrap();

        assert_eq!(config.backoff.base_delay_ms, 20);
        assert_eq!(config.backoff.multiplier, 1.5);
        assert_eq!(config.memory.long_poll_timeout_ms, 500);
    });
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_runtimevar_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(
        &config_path,
        r#"
        [file]
        poll_interval_ms = 42
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = RuntimeVarConfig::new().expect("success");
        let config = base_config
            .with_override_config(config_path.to_str().unwrap())
            .expect("override should apply");

        assert_eq!(config.file.poll_interval_ms, 42);
        assert_eq!(config.backoff, BackoffPolicy::default());
    });
}

#[test]
#[serial]
fn environment_should_win_over_override_file() {
    cleanup_all_runtimevar_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(&config_path, "[backoff]\nmax_retries = 1\n").unwrap();

    with_vars(vec![("RUNTIMEVAR__BACKOFF__MAX_RETRIES", Some("9"))], || {
        let config = RuntimeVarConfig::default()
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();
        assert_eq!(config.backoff.max_retries, 9);
    });
}

#[test]
fn validation_should_fail_with_invalid_backend_config() {
    let mut config = RuntimeVarConfig::default();
    config.memory.long_poll_timeout_ms = 0;
    let err = config.validate().unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidConfig);

    let mut config = RuntimeVarConfig::default();
    config.file.poll_interval_ms = 3_600_001;
    assert!(config.validate().is_err());
}
