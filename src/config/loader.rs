//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::CatalogSyncConfig;
use super::secret::secret_string;
use crate::domain::errors::SyncError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into CatalogSyncConfig
/// 4. Applies environment variable overrides (CATALOG_SYNC_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns a [`SyncError::Configuration`] if the file cannot be read, a
/// referenced environment variable is missing, the TOML is malformed or
/// validation fails.
///
/// # Examples
///
/// ```no_run
/// use catalog_sync::config::loader::load_config;
///
/// let config = load_config("catalog-sync.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CatalogSyncConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SyncError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        SyncError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses and validates configuration from a TOML string
///
/// Same pipeline as [`load_config`] minus the file read.
pub fn parse_config(contents: &str) -> Result<CatalogSyncConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: CatalogSyncConfig = toml::from_str(&contents)
        .map_err(|e| SyncError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        SyncError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| SyncError::Configuration(format!("Invalid placeholder pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(SyncError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        SyncError::Configuration(format!("Invalid value '{value}' for {name}"))
    })
}

/// Applies environment variable overrides using the CATALOG_SYNC_* prefix
///
/// Environment variables follow the pattern `CATALOG_SYNC_<SECTION>_<KEY>`.
/// `CATALOG_SYNC_EXTERNAL_*` variables apply to the endpoint named by
/// `sync.system` (after `CATALOG_SYNC_SYNC_SYSTEM` itself is applied).
fn apply_env_overrides(config: &mut CatalogSyncConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("CATALOG_SYNC_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Sync overrides
    if let Ok(val) = std::env::var("CATALOG_SYNC_SYNC_SYSTEM") {
        config.sync.system = val;
    }
    if let Ok(val) = std::env::var("CATALOG_SYNC_SYNC_RECORD_OPENING_BALANCE") {
        config.sync.record_opening_balance =
            parse_override("CATALOG_SYNC_SYNC_RECORD_OPENING_BALANCE", &val)?;
    }

    // External system credential overrides
    let system = config.sync.system.clone();
    if let Some(endpoint) = config
        .external_systems
        .iter_mut()
        .find(|e| e.active && e.name == system)
    {
        if let Ok(val) = std::env::var("CATALOG_SYNC_EXTERNAL_BASE_URL") {
            endpoint.base_url = val;
        }
        if let Ok(val) = std::env::var("CATALOG_SYNC_EXTERNAL_API_KEY") {
            endpoint.api_key = Some(secret_string(val));
        }
        if let Ok(val) = std::env::var("CATALOG_SYNC_EXTERNAL_USERNAME") {
            endpoint.username = Some(val);
        }
        if let Ok(val) = std::env::var("CATALOG_SYNC_EXTERNAL_PASSWORD") {
            endpoint.password = Some(secret_string(val));
        }
    }

    // Scheduler overrides
    if let Ok(val) = std::env::var("CATALOG_SYNC_SCHEDULER_WORKERS") {
        config.scheduler.workers = parse_override("CATALOG_SYNC_SCHEDULER_WORKERS", &val)?;
    }
    if let Ok(val) = std::env::var("CATALOG_SYNC_SCHEDULER_MAX_ATTEMPTS") {
        config.scheduler.max_attempts =
            parse_override("CATALOG_SYNC_SCHEDULER_MAX_ATTEMPTS", &val)?;
    }
    if let Ok(val) = std::env::var("CATALOG_SYNC_SCHEDULER_RETRY_DELAY_SECONDS") {
        config.scheduler.retry_delay_seconds =
            parse_override("CATALOG_SYNC_SCHEDULER_RETRY_DELAY_SECONDS", &val)?;
    }
    if let Ok(val) = std::env::var("CATALOG_SYNC_SCHEDULER_TRIGGERS_ENABLED") {
        config.scheduler.triggers_enabled =
            parse_override("CATALOG_SYNC_SCHEDULER_TRIGGERS_ENABLED", &val)?;
    }

    // Retention overrides
    if let Ok(val) = std::env::var("CATALOG_SYNC_RETENTION_OPERATION_LOG_DAYS") {
        config.retention.operation_log_days =
            parse_override("CATALOG_SYNC_RETENTION_OPERATION_LOG_DAYS", &val)?;
    }

    // PostgreSQL overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg) = config.postgresql {
        if let Ok(val) = std::env::var("CATALOG_SYNC_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
        if let Ok(val) = std::env::var("CATALOG_SYNC_POSTGRESQL_MAX_CONNECTIONS") {
            pg.max_connections = parse_override("CATALOG_SYNC_POSTGRESQL_MAX_CONNECTIONS", &val)?;
        }
        if let Ok(val) = std::env::var("CATALOG_SYNC_POSTGRESQL_SSL_MODE") {
            pg.ssl_mode = val;
        }
    }

    // Admin overrides
    if let Ok(val) = std::env::var("CATALOG_SYNC_ADMIN_ENABLED") {
        config.admin.enabled = parse_override("CATALOG_SYNC_ADMIN_ENABLED", &val)?;
    }
    if let Ok(val) = std::env::var("CATALOG_SYNC_ADMIN_BIND_ADDRESS") {
        config.admin.bind_address = val;
    }
    if let Ok(val) = std::env::var("CATALOG_SYNC_ADMIN_TOKEN") {
        config.admin.token = Some(secret_string(val));
    }

    // Alert overrides
    if let Ok(val) = std::env::var("CATALOG_SYNC_ALERTS_WEBHOOK_URL") {
        config.alerts.webhook_url = Some(val);
    }

    // Logging overrides
    if let Ok(val) = std::env::var("CATALOG_SYNC_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_override("CATALOG_SYNC_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Ok(val) = std::env::var("CATALOG_SYNC_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("CS_LOADER_TEST_VAR", "test_value");
        let input = "api_key = \"${CS_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "api_key = \"test_value\"\n");
        std::env::remove_var("CS_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("CS_LOADER_MISSING_VAR");
        let input = "api_key = \"${CS_LOADER_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("CS_LOADER_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        std::env::remove_var("CS_LOADER_COMMENTED_VAR");
        let input = "# api_key = \"${CS_LOADER_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(SyncError::Configuration(_))));
    }

    #[test]
    fn test_parse_config_memory_target() {
        let toml_content = r#"
database_target = "memory"

[[external_systems]]
name = "gestionale"
base_url = "https://erp.example.com/api"
api_key = "k"

[admin]
enabled = false
"#;

        let config = parse_config(toml_content).unwrap();
        assert_eq!(config.external_systems.len(), 1);
        assert_eq!(config.sync.system, "gestionale");
        assert_eq!(config.scheduler.workers, 4);
    }

    #[test]
    fn test_parse_config_rejects_unknown_target() {
        let result = parse_config("database_target = \"sqlite\"\n");
        assert!(matches!(result, Err(SyncError::Configuration(_))));
    }
}
