//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables take ENV_MUTEX so they don't
//! interfere with each other.

use catalog_sync::config::{load_config, DatabaseTarget};
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    for name in [
        "CATALOG_SYNC_APPLICATION_LOG_LEVEL",
        "CATALOG_SYNC_EXTERNAL_BASE_URL",
        "CATALOG_SYNC_EXTERNAL_API_KEY",
        "CATALOG_SYNC_SCHEDULER_MAX_ATTEMPTS",
        "CATALOG_SYNC_SCHEDULER_WORKERS",
        "CATALOG_SYNC_ADMIN_TOKEN",
        "CATALOG_SYNC_RETENTION_OPERATION_LOG_DAYS",
        "TEST_GESTIONALE_KEY",
        "TEST_ADMIN_TOKEN",
    ] {
        std::env::remove_var(name);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const MINIMAL: &str = r#"
database_target = "memory"

[[external_systems]]
name = "gestionale"
base_url = "https://gestionale.example.com"
api_key = "static-key"

[admin]
token = "admin-secret"

[logging]
local_enabled = false
"#;

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
database_target = "postgresql"

[application]
log_level = "debug"

[[external_systems]]
name = "gestionale"
system_type = "erp"
base_url = "https://gestionale.example.com/"
username = "sync"
password = "sync-pass"
timeout_seconds = 45
extra = { company = "OTT-01" }

[[external_systems]]
name = "gestionale-staging"
base_url = "https://staging.example.com"
active = false

[sync]
system = "gestionale"
sync_reference = "NIGHTLY"
record_opening_balance = false
default_category = "Accessori"
default_brand = "Generico"

[scheduler]
workers = 4
max_attempts = 5
retry_delay_seconds = 120
product_sync_at = "03:30"
inventory_sync_minute = 15
order_export_at = "04:00"
purge_weekday = "mon"
purge_at = "05:00"

[retention]
operation_log_days = 30

[postgresql]
connection_string = "postgresql://sync:pw@db.internal:5432/catalog"
max_connections = 8
ssl_mode = "require"

[admin]
bind_address = "0.0.0.0:9090"
token = "admin-secret"

[alerts]
webhook_url = "https://hooks.example.com/catalog-sync"

[logging]
local_enabled = true
local_path = "/var/log/catalog-sync"
local_rotation = "hourly"
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.database_target, DatabaseTarget::PostgreSQL);
    assert_eq!(config.external_systems.len(), 2);
    let endpoint = &config.external_systems[0];
    assert_eq!(endpoint.system_type, "erp");
    assert_eq!(endpoint.timeout_seconds, 45);
    assert_eq!(endpoint.extra["company"], "OTT-01");
    assert!(!config.external_systems[1].active);
    assert_eq!(config.sync.sync_reference, "NIGHTLY");
    assert!(!config.sync.record_opening_balance);
    assert_eq!(config.scheduler.workers, 4);
    assert_eq!(config.scheduler.max_attempts, 5);
    assert_eq!(config.scheduler.inventory_sync_minute, 15);
    assert_eq!(config.retention.operation_log_days, 30);
    assert_eq!(config.postgresql.as_ref().unwrap().max_connections, 8);
    assert_eq!(config.admin.bind_address, "0.0.0.0:9090");
    assert_eq!(config.logging.local_rotation, "hourly");
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(MINIMAL);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.database_target, DatabaseTarget::Memory);
    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.sync.system, "gestionale");
    assert!(config.sync.record_opening_balance);
    assert_eq!(config.scheduler.max_attempts, 3);
    assert_eq!(config.scheduler.retry_delay_seconds, 300);
    assert!(config.scheduler.triggers_enabled);
    assert_eq!(config.retention.operation_log_days, 90);
    assert!(config.admin.enabled);
    assert!(config.alerts.webhook_url.is_none());
    assert!(config.external_systems[0].active);
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_GESTIONALE_KEY", "substituted-key");
    std::env::set_var("TEST_ADMIN_TOKEN", "substituted-token");

    let file = write_config(
        r#"
database_target = "memory"

[[external_systems]]
name = "gestionale"
base_url = "https://gestionale.example.com"
# api_key = "${NOT_SET_BUT_COMMENTED}"
api_key = "${TEST_GESTIONALE_KEY}"

[admin]
token = "${TEST_ADMIN_TOKEN}"

[logging]
local_enabled = false
"#,
    );

    let config = load_config(file.path()).unwrap();
    let key = config.external_systems[0].api_key.as_ref().unwrap();
    let key: &str = key.expose_secret().as_ref();
    assert_eq!(key, "substituted-key");
    let token = config.admin.token.as_ref().unwrap();
    let token: &str = token.expose_secret().as_ref();
    assert_eq!(token, "substituted-token");

    cleanup_env_vars();
}

#[test]
fn test_missing_env_var_is_reported() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
database_target = "memory"

[[external_systems]]
name = "gestionale"
base_url = "https://gestionale.example.com"
api_key = "${TEST_GESTIONALE_KEY}"

[admin]
token = "${TEST_ADMIN_TOKEN}"
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    assert!(err.is_configuration());
    let message = err.to_string();
    assert!(message.contains("TEST_GESTIONALE_KEY"));
    assert!(message.contains("TEST_ADMIN_TOKEN"));
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("CATALOG_SYNC_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("CATALOG_SYNC_EXTERNAL_BASE_URL", "https://override.example.com");
    std::env::set_var("CATALOG_SYNC_EXTERNAL_API_KEY", "override-key");
    std::env::set_var("CATALOG_SYNC_SCHEDULER_MAX_ATTEMPTS", "5");
    std::env::set_var("CATALOG_SYNC_RETENTION_OPERATION_LOG_DAYS", "14");

    let file = write_config(MINIMAL);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.external_systems[0].base_url, "https://override.example.com");
    let key = config.external_systems[0].api_key.as_ref().unwrap();
    let key: &str = key.expose_secret().as_ref();
    assert_eq!(key, "override-key");
    assert_eq!(config.scheduler.max_attempts, 5);
    assert_eq!(config.retention.operation_log_days, 14);

    cleanup_env_vars();
}

#[test]
fn test_unparseable_override_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("CATALOG_SYNC_SCHEDULER_WORKERS", "many");

    let file = write_config(MINIMAL);
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("CATALOG_SYNC_SCHEDULER_WORKERS"));

    cleanup_env_vars();
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let cases = [
        // PostgreSQL target without a [postgresql] section
        MINIMAL.replace(r#"database_target = "memory""#, r#"database_target = "postgresql""#),
        // Admin API enabled without a token
        MINIMAL.replace(r#"token = "admin-secret""#, "enabled = true"),
        // Endpoint URL without a scheme
        MINIMAL.replace("https://gestionale.example.com", "gestionale.example.com"),
        format!("{MINIMAL}\n[scheduler]\nmax_attempts = 0\n"),
        format!("{MINIMAL}\n[scheduler]\nproduct_sync_at = \"25:00\"\n"),
        format!("{MINIMAL}\n[retention]\noperation_log_days = 0\n"),
        format!("{MINIMAL}\n[alerts]\nwebhook_url = \"not a url\"\n"),
    ];

    for contents in cases {
        let file = write_config(&contents);
        let err = load_config(file.path()).unwrap_err();
        assert!(err.is_configuration(), "expected configuration error for:\n{contents}");
    }
}

#[test]
fn test_missing_file_is_configuration_error() {
    let err = load_config("/nonexistent/catalog-sync.toml").unwrap_err();
    assert!(err.is_configuration());
}
