//! Init command implementation
//!
//! Writes a commented sample configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "catalog-sync.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        match fs::write(&self.output, Self::sample_config()) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your endpoint and database", self.output);
                println!("  2. Put credentials in a .env file:");
                println!("     - GESTIONALE_API_KEY");
                println!("     - CATALOG_SYNC_PG_URL");
                println!("     - CATALOG_SYNC_ADMIN_TOKEN");
                println!("  3. Validate configuration: catalog-sync validate-config");
                println!("  4. Start the engine: catalog-sync serve");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    pub(crate) fn sample_config() -> &'static str {
        r#"# Catalog Sync configuration
#
# ${VAR} references are replaced from the environment (and .env).
# Any key can also be overridden with CATALOG_SYNC_<SECTION>_<KEY>.

# Storage backend: postgresql | memory
database_target = "postgresql"

[application]
log_level = "info"

# One entry per external endpoint. Exactly one active entry may carry the
# name referenced by [sync].system.
[[external_systems]]
name = "gestionale"
system_type = "gestionale"
base_url = "https://erp.example.com"
api_key = "${GESTIONALE_API_KEY}"
# Basic credentials take precedence over the API key when both are set
# username = "sync"
# password = "${GESTIONALE_PASSWORD}"
active = true
timeout_seconds = 30

[sync]
system = "gestionale"
# Reference written on every movement created by a sync
sync_reference = "external_sync"
# Record a restock movement when a level is first created
record_opening_balance = true
default_category = "Uncategorized"
default_brand = "Generic"

[scheduler]
triggers_enabled = true
workers = 4
poll_interval_seconds = 5
max_attempts = 3
retry_delay_seconds = 300
lease_ttl_seconds = 3600
lease_retry_seconds = 30
stale_task_seconds = 7200
# Times are UTC
product_sync_at = "02:00"
inventory_sync_minute = 0
order_export_at = "03:00"
purge_weekday = "sun"
purge_at = "04:00"

[retention]
operation_log_days = 90

[postgresql]
connection_string = "${CATALOG_SYNC_PG_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60
# disable | allow | prefer | require | verify-ca | verify-full
ssl_mode = "prefer"

[admin]
enabled = true
bind_address = "127.0.0.1:8080"
token = "${CATALOG_SYNC_ADMIN_TOKEN}"

[alerts]
# webhook_url = "https://hooks.example.com/catalog-sync"
timeout_seconds = 10

[logging]
local_enabled = true
local_path = "./logs"
# daily | hourly | never
local_rotation = "daily"
"#
    }
}
