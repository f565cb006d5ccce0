//! Cached store decorator for remote mode.
//!
//! Reads come from the table cache, writes are mirrored into it before the
//! server confirms them, and each confirmed write triggers a refresh of its
//! table.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! let backend = Arc::new(PgBackend::connect(url, &PoolSettings::default()).await?);
//! let store = CachedStore::new(backend, Arc::new(TableCache::tracked()))?;
//! store.load_all().await?;
//! ```

mod store;

pub use store::CachedStore;
