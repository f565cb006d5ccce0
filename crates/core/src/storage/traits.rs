use async_trait::async_trait;

use super::{BackendMode, Result, Row, Value};

/// Uniform data-access API consumed by the rest of the application.
///
/// Queries always use positional `?` placeholders regardless of backend.
/// The synchronous methods never block on the network: in remote mode they
/// are served from the table cache and writes complete in the background.
#[async_trait]
pub trait Store: Send + Sync {
    /// Which backend serves this store.
    fn mode(&self) -> BackendMode;

    /// Runs a mutation from a synchronous call site.
    fn execute(&self, query: &str, params: &[Value]) -> Result<()>;

    /// Runs a mutation and resolves once the authoritative store acknowledged it.
    async fn execute_async(&self, query: &str, params: &[Value]) -> Result<()>;

    /// Returns all rows produced by `query`.
    fn fetch_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Async variant of [`Store::fetch_all`].
    async fn fetch_all_async(&self, query: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Returns the first row produced by `query`, if any.
    fn fetch_one(&self, query: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.fetch_all(query, params)?.into_iter().next())
    }

    /// Async variant of [`Store::fetch_one`].
    async fn fetch_one_async(&self, query: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self
            .fetch_all_async(query, params)
            .await?
            .into_iter()
            .next())
    }

    /// Reloads every mirrored table from the authoritative store.
    ///
    /// For administrative paths that write in ways the optimistic emulation
    /// does not recognize. A no-op for backends without a cache.
    async fn force_cache_refresh(&self) -> Result<()>;
}

/// Raw asynchronous access to the networked server.
///
/// Implementations translate `?` placeholders into their native syntax.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Executes a statement, returning the number of affected rows.
    async fn execute(&self, query: &str, params: &[Value]) -> Result<u64>;

    /// Runs a query and returns every row.
    async fn fetch_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>>;
}
