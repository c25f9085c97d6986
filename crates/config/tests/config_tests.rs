//! Tests for configuration parsing and validation.

use medianet_config::{Config, ConfigError};

#[test]
fn empty_document_yields_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config.protocol.epoch_length_secs, 300);
    assert_eq!(config.fetch.max_concurrency, 8);
    assert_eq!(config.fetch.http_timeout_secs, 10);
    assert_eq!(config.fetch.attempts, 2);
    assert_eq!(config.retry.rpc_attempts, 3);
    assert!((config.gas.dispute_gas_multiplier - 2.0).abs() < f64::EPSILON);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn overrides_are_honored() {
    let config = Config::from_toml(
        r#"
        [provider]
        url = "https://rpc.staging.example.com"
        chain_id = 4242

        [protocol]
        epoch_length_secs = 600

        [gas]
        dispute_gas_multiplier = 3.5
        "#,
    )
    .unwrap();

    assert_eq!(config.provider.url, "https://rpc.staging.example.com");
    assert_eq!(config.provider.chain_id, 4242);
    assert_eq!(config.protocol.epoch_length_secs, 600);
    assert!((config.gas.dispute_gas_multiplier - 3.5).abs() < f64::EPSILON);
}

#[test]
fn rejects_non_http_provider() {
    let err = Config::from_toml(
        r#"
        [provider]
        url = "ws://rpc.example.com"
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidProviderUrl(_)));
}

#[test]
fn rejects_zero_chain_id() {
    let err = Config::from_toml(
        r#"
        [provider]
        chain_id = 0
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidChainId));
}

#[test]
fn rejects_out_of_range_epoch_length() {
    let err = Config::from_toml(
        r#"
        [protocol]
        epoch_length_secs = 5
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEpochLength { got: 5, .. }));
}

#[test]
fn rejects_absurd_gas_multiplier() {
    let err = Config::from_toml(
        r#"
        [gas]
        dispute_gas_multiplier = 0.5
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidGasMultiplier(_)));
}

#[test]
fn rejects_zero_fetch_concurrency() {
    let err = Config::from_toml(
        r#"
        [fetch]
        max_concurrency = 0
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConcurrency));
}

#[test]
fn rejects_unknown_log_level() {
    let err = Config::from_toml(
        r#"
        [logging]
        level = "loud"
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidLogLevel(_)));
}
