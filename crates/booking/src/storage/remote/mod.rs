//! Remote storage backend implementation.
//!
//! A pooled Postgres connection using `sqlx`. All operations are async.

mod backend;
mod conversions;
mod error;

pub use backend::{PgBackend, PoolSettings};
