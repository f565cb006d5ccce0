//! The store the application talks to, chosen once at startup.

use std::sync::Arc;

use async_trait::async_trait;

use booking_core::storage::{BackendMode, Result, Row, Store, StoreError, Value};

use crate::cache::{TableCache, TableStatus};
use crate::config::Config;
use crate::storage::{CachedStore, EmbeddedStore, PgBackend};

/// Either engine behind one `Store` interface.
pub enum Database {
    Embedded(EmbeddedStore),
    Remote(CachedStore<PgBackend>),
}

impl Database {
    /// Opens the backend selected by `config`.
    ///
    /// Embedded mode creates the data directory and loads the snapshot.
    /// Remote mode connects, probes, creates the schema and loads the cache.
    /// Configuration and connectivity errors mean the process must not start
    /// serving; a failed initial cache load does not, since tables that did
    /// not load are read from the server until a refresh succeeds.
    pub async fn connect(config: &Config) -> Result<Self> {
        match config.mode()? {
            BackendMode::Embedded => {
                let store = EmbeddedStore::open(&config.data_dir, &config.embedded_db_file)?;
                tracing::info!(
                    mode = %BackendMode::Embedded,
                    path = %config.snapshot_path().display(),
                    "Storage backend selected"
                );
                Ok(Database::Embedded(store))
            }
            BackendMode::Remote => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    StoreError::Configuration("DATABASE_URL is not set".to_string())
                })?;
                let backend = PgBackend::connect(url, &config.pool).await?;
                backend.init_schema().await?;

                let store = CachedStore::new(Arc::new(backend), Arc::new(TableCache::tracked()))?;
                if let Err(err) = store.load_all().await {
                    tracing::warn!(error = %err, "Initial cache load incomplete");
                }
                tracing::info!(mode = %BackendMode::Remote, "Storage backend selected");
                Ok(Database::Remote(store))
            }
        }
    }

    fn store(&self) -> &dyn Store {
        match self {
            Database::Embedded(store) => store,
            Database::Remote(store) => store,
        }
    }

    /// Per-table cache status. `None` in embedded mode, which has no cache.
    pub fn cache_status(&self) -> Option<Vec<TableStatus>> {
        match self {
            Database::Embedded(_) => None,
            Database::Remote(store) => Some(store.cache().status()),
        }
    }

    /// Waits for background writes and refreshes to finish.
    pub async fn flush(&self) {
        if let Database::Remote(store) = self {
            store.flush().await;
        }
    }

    /// Flushes pending work and releases connections.
    pub async fn close(&self) {
        if let Database::Remote(store) = self {
            store.flush().await;
            store.backend().close().await;
            tracing::info!("Remote connections closed");
        }
    }
}

#[async_trait]
impl Store for Database {
    fn mode(&self) -> BackendMode {
        self.store().mode()
    }

    fn execute(&self, query: &str, params: &[Value]) -> Result<()> {
        self.store().execute(query, params)
    }

    async fn execute_async(&self, query: &str, params: &[Value]) -> Result<()> {
        self.store().execute_async(query, params).await
    }

    fn fetch_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.store().fetch_all(query, params)
    }

    async fn fetch_all_async(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.store().fetch_all_async(query, params).await
    }

    async fn force_cache_refresh(&self) -> Result<()> {
        self.store().force_cache_refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PoolSettings;
    use std::time::Duration;

    fn embedded_config(dir: &std::path::Path) -> Config {
        Config {
            database_url: None,
            backend: None,
            data_dir: dir.join("data"),
            embedded_db_file: "booking.db".to_string(),
            pool: PoolSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_embedded_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(&embedded_config(dir.path())).await.unwrap();

        assert_eq!(db.mode(), BackendMode::Embedded);
        assert!(db.cache_status().is_none());
        assert!(dir.path().join("data/booking.db").exists());

        db.execute(
            "INSERT INTO staff (id, name) VALUES (?, ?)",
            &["s1".into(), "Ava".into()],
        )
        .unwrap();
        let rows = db.fetch_all("SELECT * FROM staff", &[]).unwrap();
        assert_eq!(rows.len(), 1);

        db.force_cache_refresh().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_remote_without_url_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            backend: Some(BackendMode::Remote),
            ..embedded_config(dir.path())
        };

        let err = Database::connect(&config).await.err().unwrap();
        assert!(matches!(err, StoreError::Configuration(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_url: Some("postgres://booking@127.0.0.1:1/booking".to_string()),
            pool: PoolSettings {
                acquire_timeout: Duration::from_secs(2),
                ..PoolSettings::default()
            },
            ..embedded_config(dir.path())
        };

        let err = Database::connect(&config).await.err().unwrap();
        assert!(matches!(err, StoreError::Connectivity(_)));
        assert!(err.is_fatal());
    }
}
