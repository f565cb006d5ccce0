//! Storage backend implementations.
//!
//! This module provides the concrete stores behind the `Store` trait defined
//! in `booking_core::storage`. The backend is chosen at startup from the
//! configuration, not at compile time.
//!
//! - `embedded`: in-process SQLite persisted as a single snapshot file
//! - `remote`: pooled Postgres connection
//! - `cached`: the remote backend wrapped with the table cache

pub mod cached;
pub mod embedded;
pub mod remote;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

pub use cached::CachedStore;
pub use embedded::EmbeddedStore;
pub use remote::{PgBackend, PoolSettings};
