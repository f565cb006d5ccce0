//! Cached remote store.
//!
//! Wraps a `RemoteBackend` with the table cache:
//!
//! - **Reads**: served from the cached rows through the query interpreter.
//!   Async reads of tables that hold neither a completed load nor a local
//!   write go to the server.
//! - **Writes**: mirrored into the cache first when the shape is recognized,
//!   then sent to the server, then the table is refreshed.
//!
//! Fire-and-forget work runs on a `JoinSet` so it can be awaited with
//! [`CachedStore::flush`] instead of being dropped on the floor.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinSet;

use booking_core::query::{Mutation, QueryPlan};
use booking_core::sql::{extract_table, StatementKind};
use booking_core::storage::{BackendMode, RemoteBackend, Result, Row, Store, StoreError, Value};

use crate::cache::TableCache;

/// Remote store serving reads from the table cache.
///
/// # Type Parameters
///
/// * `B` - The networked backend holding the authoritative rows
pub struct CachedStore<B> {
    backend: Arc<B>,
    cache: Arc<TableCache>,
    tasks: Arc<Mutex<JoinSet<()>>>,
    runtime: Handle,
}

impl<B> Clone for CachedStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            cache: Arc::clone(&self.cache),
            tasks: Arc::clone(&self.tasks),
            runtime: self.runtime.clone(),
        }
    }
}

impl<B> CachedStore<B>
where
    B: RemoteBackend + 'static,
{
    /// Creates a cached store. Must be called from within a Tokio runtime,
    /// which background writes and refreshes are spawned onto.
    pub fn new(backend: Arc<B>, cache: Arc<TableCache>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            StoreError::Configuration(format!("remote mode requires an async runtime: {e}"))
        })?;
        Ok(Self {
            backend,
            cache,
            tasks: Arc::new(Mutex::new(JoinSet::new())),
            runtime,
        })
    }

    pub fn cache(&self) -> &Arc<TableCache> {
        &self.cache
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Loads every tracked table, one unfiltered read each.
    ///
    /// A table that fails to load keeps what it had. Every table is attempted
    /// and the first error is returned.
    pub async fn load_all(&self) -> Result<()> {
        let mut first_error = None;
        for table in self.cache.tables() {
            if let Err(err) = refresh_table(self.backend.as_ref(), &self.cache, &table).await {
                tracing::warn!(table = %table, error = %err, "Failed to load table");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Reloads one table from the server.
    pub async fn refresh(&self, table: &str) -> Result<()> {
        refresh_table(self.backend.as_ref(), &self.cache, table).await
    }

    /// Reloads one table in the background. Failures are logged only.
    pub fn spawn_refresh(&self, table: String) {
        let backend = Arc::clone(&self.backend);
        let cache = Arc::clone(&self.cache);
        self.spawn(async move {
            if let Err(err) = refresh_table(backend.as_ref(), &cache, &table).await {
                tracing::warn!(table = %table, error = %err, "Background refresh failed");
            }
        });
    }

    /// Waits for every background write and refresh, including ones spawned
    /// while waiting.
    pub async fn flush(&self) {
        loop {
            let mut pending = std::mem::take(&mut *self.tasks());
            if pending.is_empty() {
                break;
            }
            while let Some(result) = pending.join_next().await {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "Background task panicked");
                }
            }
        }
    }

    /// Number of background tasks not yet reaped.
    pub fn pending_tasks(&self) -> usize {
        self.tasks().len()
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks();
        while let Some(result) = tasks.try_join_next() {
            if let Err(err) = result {
                tracing::warn!(error = %err, "Background task panicked");
            }
        }
        tasks.spawn_on(task, &self.runtime);
    }

    /// Mirrors a write into the cache when its shape is recognized.
    ///
    /// Returns the tracked table the write targets, which must be refreshed
    /// once the server has acknowledged it.
    fn apply_optimistic(&self, query: &str, params: &[Value]) -> Option<String> {
        let table = extract_table(query).filter(|t| self.cache.is_tracked(t))?;

        match Mutation::parse(query, params) {
            Some(mutation) => {
                let touched = self
                    .cache
                    .mutate(&table, |rows| mutation.apply(rows))
                    .unwrap_or(0);
                tracing::debug!(table = %table, rows = touched, "Applied optimistic write");
            }
            None => {
                tracing::debug!(table = %table, "Write shape not emulated, waiting for refresh");
            }
        }
        Some(table)
    }

    fn read_cached(&self, table: &str, query: &str, params: &[Value]) -> Vec<Row> {
        let rows = self.cache.snapshot(table).unwrap_or_default();
        QueryPlan::parse(query, params).evaluate(&rows)
    }

    /// Sends a write in the background, then refreshes its table.
    fn spawn_write(&self, query: &str, params: &[Value], table: Option<String>) {
        let backend = Arc::clone(&self.backend);
        let cache = Arc::clone(&self.cache);
        let query = query.to_string();
        let params = params.to_vec();

        self.spawn(async move {
            match backend.execute(&query, &params).await {
                Ok(rows) => tracing::debug!(rows, "Background write acknowledged"),
                Err(err) => tracing::warn!(error = %err, query = %query, "Background write failed"),
            }
            // Refresh even after a failure so a rejected optimistic write is rolled back.
            if let Some(table) = table {
                if let Err(err) = refresh_table(backend.as_ref(), &cache, &table).await {
                    tracing::warn!(table = %table, error = %err, "Background refresh failed");
                }
            }
        });
    }
}

/// Reloads `table` into `cache`. Untracked tables are skipped.
async fn refresh_table<B>(backend: &B, cache: &TableCache, table: &str) -> Result<()>
where
    B: RemoteBackend + ?Sized,
{
    let Some(ticket) = cache.begin_refresh(table) else {
        return Ok(());
    };

    match backend.fetch_all(&format!("SELECT * FROM {table}"), &[]).await {
        Ok(rows) => {
            let count = rows.len();
            let applied = cache.complete_refresh(table, ticket, rows);
            tracing::debug!(table = %table, rows = count, applied, "Refreshed table");
            Ok(())
        }
        Err(err) => {
            cache.fail_refresh(table, ticket);
            Err(err)
        }
    }
}

#[async_trait]
impl<B> Store for CachedStore<B>
where
    B: RemoteBackend + 'static,
{
    fn mode(&self) -> BackendMode {
        BackendMode::Remote
    }

    fn execute(&self, query: &str, params: &[Value]) -> Result<()> {
        let table = self.apply_optimistic(query, params);
        self.spawn_write(query, params, table);
        Ok(())
    }

    async fn execute_async(&self, query: &str, params: &[Value]) -> Result<()> {
        let table = self.apply_optimistic(query, params);
        let result = self.backend.execute(query, params).await;
        if let Some(table) = table {
            self.spawn_refresh(table);
        }
        let rows = result?;
        tracing::debug!(rows, "Write acknowledged");
        Ok(())
    }

    fn fetch_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        if StatementKind::of(query).is_write() {
            tracing::warn!(
                query = %query,
                "Rows returned by a write are not available synchronously in remote mode"
            );
            self.execute(query, params)?;
            return Ok(Vec::new());
        }

        match extract_table(query).filter(|t| self.cache.is_tracked(t)) {
            Some(table) => Ok(self.read_cached(&table, query, params)),
            None => {
                tracing::warn!(query = %query, "Query targets no cached table, returning no rows");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_all_async(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        if StatementKind::of(query).is_write() {
            let table = self.apply_optimistic(query, params);
            let result = self.backend.fetch_all(query, params).await;
            if let Some(table) = table {
                self.spawn_refresh(table);
            }
            return result;
        }

        match extract_table(query).filter(|t| self.cache.is_tracked(t)) {
            Some(table) if self.cache.is_populated(&table) => {
                Ok(self.read_cached(&table, query, params))
            }
            _ => self.backend.fetch_all(query, params).await,
        }
    }

    async fn force_cache_refresh(&self) -> Result<()> {
        self.load_all().await
    }
}
