//! PostgreSQL client implementation
//!
//! Connection pooling, TLS selection, statement timeouts and the schema
//! migration live here; SQL for the storage traits lives in the adapter.

use crate::config::schema::PostgreSQLConfig;
use crate::domain::{Result, SyncError};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::{NoTls, Row, Socket};

/// PostgreSQL client for Catalog Sync
pub struct PostgreSQLClient {
    pool: Pool,
    config: PostgreSQLConfig,
}

fn build_pool<T>(pg_config: tokio_postgres::Config, tls: T, config: &PostgreSQLConfig) -> Result<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let manager = Manager::from_config(
        pg_config,
        tls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let timeout = Duration::from_secs(config.connection_timeout_seconds);

    Pool::builder(manager)
        .max_size(config.max_connections)
        .wait_timeout(Some(timeout))
        .create_timeout(Some(timeout))
        .recycle_timeout(Some(timeout))
        .runtime(deadpool_postgres::Runtime::Tokio1)
        .build()
        .map_err(|e| SyncError::Database(format!("Failed to create connection pool: {e}")))
}

/// TLS connector for an `ssl_mode`, or `None` for plaintext
///
/// `require` and `prefer` encrypt without verifying the server certificate,
/// `verify-ca` skips the hostname check, `verify-full` checks both.
fn tls_connector(ssl_mode: &str) -> Result<Option<MakeTlsConnector>> {
    let mut builder = TlsConnector::builder();
    match ssl_mode {
        "disable" => return Ok(None),
        "allow" | "prefer" | "require" => {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        "verify-ca" => {
            builder.danger_accept_invalid_hostnames(true);
        }
        _ => {}
    }

    let connector = builder
        .build()
        .map_err(|e| SyncError::Configuration(format!("Failed to build TLS connector: {e}")))?;
    Ok(Some(MakeTlsConnector::new(connector)))
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the pool
    /// cannot be built. No connection is opened yet.
    pub async fn new(config: PostgreSQLConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_ref()
            .parse()
            .map_err(|e| {
                SyncError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;

        let pool = match tls_connector(&config.ssl_mode)? {
            Some(tls) => {
                pg_config.ssl_mode(match config.ssl_mode.as_str() {
                    "allow" | "prefer" => SslMode::Prefer,
                    _ => SslMode::Require,
                });
                build_pool(pg_config, tls, &config)?
            }
            None => {
                pg_config.ssl_mode(SslMode::Disable);
                build_pool(pg_config, NoTls, &config)?
            }
        };

        Ok(Self { pool, config })
    }

    /// Gets a connection and runs `SELECT 1`
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| SyncError::Database(format!("Connection test failed: {e}")))?;

        tracing::info!(target = %self.connection_string_safe(), "PostgreSQL connection test successful");
        Ok(())
    }

    /// Applies the schema migration
    ///
    /// The migration only uses `IF NOT EXISTS` statements, so running it on
    /// every start is safe.
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.get_connection().await?;
        let migration_sql = include_str!("../../../migrations/001_initial_schema.sql");

        client
            .batch_execute(migration_sql)
            .await
            .map_err(|e| SyncError::Database(format!("Failed to execute migration: {e}")))?;

        tracing::info!("PostgreSQL schema initialized successfully");
        Ok(())
    }

    /// Get a connection from the pool with the statement timeout applied
    pub async fn get_connection(&self) -> Result<Object> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| SyncError::Database(format!("Failed to get connection from pool: {e}")))?;

        let timeout_query = format!(
            "SET statement_timeout = {}",
            self.config.statement_timeout_seconds * 1000
        );
        client
            .batch_execute(&timeout_query)
            .await
            .map_err(|e| SyncError::Database(format!("Failed to set statement timeout: {e}")))?;

        Ok(client)
    }

    /// Execute a query and return rows
    pub async fn query(
        &self,
        query: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Row>> {
        let client = self.get_connection().await?;
        client
            .query(query, params)
            .await
            .map_err(|e| SyncError::Database(format!("Query failed: {e}")))
    }

    /// Execute a query expected to return at most one row
    pub async fn query_opt(
        &self,
        query: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Option<Row>> {
        let client = self.get_connection().await?;
        client
            .query_opt(query, params)
            .await
            .map_err(|e| SyncError::Database(format!("Query failed: {e}")))
    }

    /// Execute a statement and return the number of affected rows
    pub async fn execute(
        &self,
        statement: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<u64> {
        let client = self.get_connection().await?;
        client
            .execute(statement, params)
            .await
            .map_err(|e| SyncError::Database(format!("Statement execution failed: {e}")))
    }

    /// Get the connection string (without credentials)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(self.config.connection_string.expose_secret().as_ref())
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

fn redact_connection_string(connection_string: &str) -> String {
    connection_string
        .rsplit_once('@')
        .map(|(_, host)| format!("postgresql://***@{host}"))
        .unwrap_or_else(|| "postgresql://***".to_string())
}
