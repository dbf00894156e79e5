//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Note that Config::from_env() also loads
//! from .env file via dotenvy, so these tests focus on override behavior.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use pretty_assertions::assert_eq;
use retail_copilot::config::{Config, LogFormat};
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_config_from_env_loads_successfully() {
    let result = Config::from_env();
    assert!(
        result.is_ok(),
        "Config::from_env() should succeed with defaults"
    );
}

#[test]
#[serial]
fn test_config_from_env_custom_model() {
    env::set_var("MODEL_BASE_URL", "https://custom.api.com/v1");
    env::set_var("MODEL_NAME", "custom-model");
    env::set_var("MODEL_TEMPERATURE", "0.7");

    let config = Config::from_env().unwrap();
    assert_eq!(config.model.base_url, "https://custom.api.com/v1");
    assert_eq!(config.model.model_name, "custom-model");
    assert!((config.model.temperature - 0.7).abs() < 1e-9);

    // Restore defaults
    env::remove_var("MODEL_BASE_URL");
    env::remove_var("MODEL_NAME");
    env::remove_var("MODEL_TEMPERATURE");
}

#[test]
#[serial]
fn test_config_from_env_custom_database() {
    env::set_var("DATABASE_PATH", "/custom/retail.sqlite");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");
    env::set_var("SQL_TIMEOUT_MS", "2500");

    let config = Config::from_env().unwrap();
    assert_eq!(
        config.database.path.to_str().unwrap(),
        "/custom/retail.sqlite"
    );
    assert_eq!(config.database.max_connections, 10);
    assert_eq!(config.database.query_timeout_ms, 2500);

    // Restore defaults
    env::remove_var("DATABASE_PATH");
    env::remove_var("DATABASE_MAX_CONNECTIONS");
    env::remove_var("SQL_TIMEOUT_MS");
}

#[test]
#[serial]
fn test_config_from_env_custom_retrieval() {
    env::set_var("DOCS_DIR", "/custom/docs");
    env::set_var("RETRIEVAL_TOP_K", "5");

    let config = Config::from_env().unwrap();
    assert_eq!(config.retrieval.docs_dir.to_str().unwrap(), "/custom/docs");
    assert_eq!(config.retrieval.top_k, 5);

    env::remove_var("DOCS_DIR");
    env::remove_var("RETRIEVAL_TOP_K");
}

#[test]
#[serial]
fn test_config_from_env_custom_repair_bounds() {
    env::set_var("MAX_SQL_ATTEMPTS", "5");
    env::set_var("MAX_SYNTHESIS_ATTEMPTS", "3");

    let config = Config::from_env().unwrap();
    assert_eq!(config.repair.max_sql_attempts, 5);
    assert_eq!(config.repair.max_synthesis_attempts, 3);

    env::remove_var("MAX_SQL_ATTEMPTS");
    env::remove_var("MAX_SYNTHESIS_ATTEMPTS");
}

#[test]
#[serial]
fn test_config_from_env_custom_penalties() {
    env::set_var("PENALTY_SQL_RETRY", "0.25");
    env::set_var("PENALTY_NO_CITATIONS", "0.15");

    let config = Config::from_env().unwrap();
    assert!((config.penalties.sql_retry - 0.25).abs() < 1e-9);
    assert!((config.penalties.no_citations - 0.15).abs() < 1e-9);
    // Untouched penalties keep their defaults
    assert!((config.penalties.final_execution_error - 0.3).abs() < 1e-9);

    env::remove_var("PENALTY_SQL_RETRY");
    env::remove_var("PENALTY_NO_CITATIONS");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_from_env_batch_workers_floor() {
    env::set_var("BATCH_WORKERS", "0");

    let config = Config::from_env().unwrap();
    assert_eq!(config.batch.workers, 1);

    env::remove_var("BATCH_WORKERS");
}

#[test]
#[serial]
fn test_config_from_env_trace_dir_optional() {
    env::remove_var("TRACE_DIR");
    let config = Config::from_env().unwrap();
    assert!(config.batch.trace_dir.is_none());

    env::set_var("TRACE_DIR", "/tmp/traces");
    let config = Config::from_env().unwrap();
    assert_eq!(
        config.batch.trace_dir.as_ref().unwrap().to_str().unwrap(),
        "/tmp/traces"
    );
    env::remove_var("TRACE_DIR");
}

#[test]
#[serial]
fn test_config_invalid_numeric_falls_back_to_default() {
    env::set_var("RETRIEVAL_TOP_K", "not-a-number");

    let config = Config::from_env().unwrap();
    assert_eq!(config.retrieval.top_k, 3);

    env::remove_var("RETRIEVAL_TOP_K");
}
