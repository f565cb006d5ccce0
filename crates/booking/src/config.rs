use std::{env, path::PathBuf, time::Duration};

use booking_core::storage::{is_networked_url, select_backend, BackendMode, Result, StoreError};

use crate::storage::PoolSettings;

/// Data-access configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Connection string; a `postgres://` URL selects remote mode.
    pub database_url: Option<String>,
    /// Forces a backend instead of inferring it from `database_url`.
    pub backend: Option<BackendMode>,
    /// Directory holding the embedded snapshot (default: "data")
    pub data_dir: PathBuf,
    /// Embedded snapshot file name (default: "booking.db")
    pub embedded_db_file: String,
    /// Remote connection pool limits.
    pub pool: PoolSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - Connection string (default: unset, embedded mode)
    /// - `DATABASE_BACKEND` - `embedded` or `remote` override (default: inferred)
    /// - `DATA_DIR` - Embedded data directory (default: "data")
    /// - `EMBEDDED_DB_FILE` - Embedded snapshot file (default: "booking.db")
    /// - `DB_POOL_MAX_CONNECTIONS` - Remote pool size (default: 10)
    /// - `DB_ACQUIRE_TIMEOUT_SECONDS` - Wait for a pooled connection (default: 30)
    /// - `DB_STATEMENT_TIMEOUT_SECONDS` - Per-statement server limit (default: 30)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PoolSettings::default();
        let seconds = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let backend = lookup("DATABASE_BACKEND").and_then(|v| match v.parse() {
            Ok(mode) => Some(mode),
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring DATABASE_BACKEND");
                None
            }
        });

        Self {
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            backend,
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            embedded_db_file: lookup("EMBEDDED_DB_FILE")
                .unwrap_or_else(|| "booking.db".to_string()),
            pool: PoolSettings {
                max_connections: lookup("DB_POOL_MAX_CONNECTIONS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_connections),
                acquire_timeout: seconds("DB_ACQUIRE_TIMEOUT_SECONDS", defaults.acquire_timeout),
                statement_timeout: seconds(
                    "DB_STATEMENT_TIMEOUT_SECONDS",
                    defaults.statement_timeout,
                ),
            },
        }
    }

    /// Resolves which backend to run.
    ///
    /// Forcing remote mode without a networked connection string is a
    /// configuration error.
    pub fn mode(&self) -> Result<BackendMode> {
        match self.backend {
            Some(BackendMode::Remote) => match self.database_url.as_deref() {
                Some(url) if is_networked_url(url) => Ok(BackendMode::Remote),
                Some(_) => Err(StoreError::Configuration(
                    "DATABASE_URL is not a postgres:// connection string".to_string(),
                )),
                None => Err(StoreError::Configuration(
                    "remote backend selected but DATABASE_URL is not set".to_string(),
                )),
            },
            Some(BackendMode::Embedded) => Ok(BackendMode::Embedded),
            None => Ok(select_backend(self.database_url.as_deref())),
        }
    }

    /// Full path of the embedded snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.embedded_db_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
