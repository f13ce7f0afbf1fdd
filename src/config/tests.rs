use super::*;
use crate::FleetError;
use serial_test::serial;
use std::env;

fn cleanup_test_env() {
    env::remove_var("DASHBOARD_API_KEY");
    env::remove_var("HOST");
    env::remove_var("PORT");
    env::remove_var("ALLOWED_ORIGINS");
    env::remove_var("RATE_LIMIT_WINDOW_MS");
    env::remove_var("RATE_LIMIT_MAX_REQUESTS");
    env::remove_var("DATA_DIR");
    env::remove_var("LINEAR_WEBHOOK_SECRET");
}

#[test]
#[serial]
fn test_config_missing_api_key() {
    cleanup_test_env();

    let result = Config::load();

    assert!(result.is_err());
    match result.unwrap_err() {
        FleetError::Config(msg) => {
            assert!(msg.contains("DASHBOARD_API_KEY"));
        }
        other => panic!("expected Config error, got {other:?}"),
    }

    cleanup_test_env();
}

#[test]
#[serial]
fn test_config_short_api_key_rejected() {
    cleanup_test_env();
    env::set_var("DASHBOARD_API_KEY", "too-short");

    let result = Config::load();

    assert!(matches!(result, Err(FleetError::Config(_))));

    cleanup_test_env();
}

#[test]
#[serial]
fn test_config_defaults() {
    cleanup_test_env();
    env::set_var(
        "DASHBOARD_API_KEY",
        "a-sufficiently-long-dashboard-api-key-value",
    );

    let config = Config::load().expect("config should load with defaults");

    assert_eq!(config.api.host, "127.0.0.1");
    assert_eq!(config.api.port, 3000);
    assert_eq!(config.rate_limit.window_ms, 60_000);
    assert_eq!(config.rate_limit.max_requests, 60);
    assert!(config.webhook.linear_webhook_secret.is_none());
    assert_eq!(
        config.api.allowed_origins,
        vec![
            "http://localhost:3000".to_string(),
            "http://127.0.0.1:3000".to_string()
        ]
    );

    cleanup_test_env();
}

#[test]
#[serial]
fn test_config_custom_origins_and_rate_limit() {
    cleanup_test_env();
    env::set_var(
        "DASHBOARD_API_KEY",
        "a-sufficiently-long-dashboard-api-key-value",
    );
    env::set_var("ALLOWED_ORIGINS", " https://a.example , https://b.example ");
    env::set_var("RATE_LIMIT_WINDOW_MS", "1000");
    env::set_var("RATE_LIMIT_MAX_REQUESTS", "5");

    let config = Config::load().expect("config should load");

    assert_eq!(
        config.api.allowed_origins,
        vec!["https://a.example".to_string(), "https://b.example".to_string()]
    );
    assert_eq!(config.rate_limit.window_ms, 1000);
    assert_eq!(config.rate_limit.max_requests, 5);

    cleanup_test_env();
}

#[test]
#[serial]
fn test_config_zero_window_rejected() {
    cleanup_test_env();
    env::set_var(
        "DASHBOARD_API_KEY",
        "a-sufficiently-long-dashboard-api-key-value",
    );
    env::set_var("RATE_LIMIT_WINDOW_MS", "0");

    let result = Config::load();

    assert!(matches!(result, Err(FleetError::Config(_))));

    cleanup_test_env();
}
