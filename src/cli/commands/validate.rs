//! Validate config command implementation

use crate::config::load_config;
use crate::config::schema::DatabaseTarget;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading already validates
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Sync Endpoint: {}", config.sync.system);
        for system in &config.external_systems {
            println!(
                "    - {} ({}) {} [{}]",
                system.name,
                system.system_type,
                system.base_url,
                if system.active { "active" } else { "inactive" }
            );
        }

        match config.database_target {
            DatabaseTarget::PostgreSQL => {
                if let Some(ref pg_config) = config.postgresql {
                    use secrecy::ExposeSecret;
                    println!("  Database Target: PostgreSQL");
                    println!(
                        "  PostgreSQL Host: {}",
                        pg_config
                            .connection_string
                            .expose_secret()
                            .as_ref()
                            .rsplit('@')
                            .next()
                            .unwrap_or("***")
                    );
                    println!("  Max Connections: {}", pg_config.max_connections);
                }
            }
            DatabaseTarget::Memory => {
                println!("  Database Target: in-memory (nothing is persisted)");
            }
        }

        let scheduler = &config.scheduler;
        println!("  Workers: {}", scheduler.workers);
        println!(
            "  Retry: {} attempts, {}s apart",
            scheduler.max_attempts, scheduler.retry_delay_seconds
        );
        if scheduler.triggers_enabled {
            println!(
                "  Triggers: products daily at {}, inventory hourly at :{:02}, orders daily at {}",
                scheduler.product_sync_at, scheduler.inventory_sync_minute, scheduler.order_export_at
            );
        } else {
            println!("  Triggers: disabled");
        }
        println!(
            "  Operation Log Retention: {} days",
            config.retention.operation_log_days
        );
        if config.admin.enabled {
            println!("  Admin API: {}", config.admin.bind_address);
        }
        println!();
        Ok(0)
    }
}
