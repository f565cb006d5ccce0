//! Postgres backend implementation.
//!
//! Implements `RemoteBackend` from `booking_core::storage` over a bounded
//! `sqlx` connection pool. Every call is an independent round trip; the pool
//! queues callers beyond `max_connections` until `acquire_timeout` expires.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use booking_core::sql::to_numbered_placeholders;
use booking_core::storage::{RemoteBackend, Result, Row, StoreError, Value};

use super::conversions::{bind_value, pg_row_to_row};
use super::error::{is_duplicate_column, map_sqlx_error};
use crate::storage::schema;

/// Connection pool limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Server-side limit applied to every statement on each connection.
    pub statement_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            statement_timeout: Duration::from_secs(30),
        }
    }
}

/// Pooled connection to the networked server.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Builds the pool and probes the server with a trivial query.
    ///
    /// Unparseable URLs are configuration errors; anything that prevents the
    /// probe from succeeding is a connectivity error.
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self> {
        let options = connect_options(url, settings)?;
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| match map_sqlx_error(e) {
                StoreError::Configuration(msg) => StoreError::Configuration(msg),
                other => StoreError::Connectivity(other.to_string()),
            })?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Connectivity(format!("startup probe failed: {e}")))?;

        tracing::info!(
            max_connections = settings.max_connections,
            acquire_timeout = ?settings.acquire_timeout,
            statement_timeout = ?settings.statement_timeout,
            "Connected to remote database"
        );

        Ok(Self { pool })
    }

    /// Creates every tracked table and applies pending column migrations.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(schema::CREATE_TABLES)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        for migration in schema::MIGRATIONS {
            match sqlx::raw_sql(migration).execute(&self.pool).await {
                Ok(_) => tracing::debug!(migration, "Applied migration"),
                Err(e) if is_duplicate_column(&e) => {}
                Err(e) => return Err(map_sqlx_error(e)),
            }
        }
        Ok(())
    }

    /// Closes the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Parses `url` and attaches the per-connection statement timeout, sent
/// as a startup parameter so every pooled connection carries it.
fn connect_options(url: &str, settings: &PoolSettings) -> Result<PgConnectOptions> {
    let options = PgConnectOptions::from_str(url)
        .map_err(|e| StoreError::Configuration(format!("invalid DATABASE_URL: {e}")))?;
    Ok(options.options([(
        "statement_timeout",
        settings.statement_timeout.as_millis().to_string(),
    )]))
}

#[async_trait]
impl RemoteBackend for PgBackend {
    async fn execute(&self, query: &str, params: &[Value]) -> Result<u64> {
        let sql = to_numbered_placeholders(query);
        let mut statement = sqlx::query(&sql);
        for param in params {
            statement = bind_value(statement, param);
        }

        let result = statement.execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        let sql = to_numbered_placeholders(query);
        let mut statement = sqlx::query(&sql);
        for param in params {
            statement = bind_value(statement, param);
        }

        let rows = statement
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.iter().map(pg_row_to_row).collect())
    }
}
