//! Data-access layer for the booking assistant.
//!
//! One synchronous-feeling API over two engines: an embedded SQLite file for
//! local use, and a Postgres server mirrored by an in-memory table cache.

pub mod cache;
pub mod config;
pub mod database;
pub mod storage;

pub use booking_core::storage::{BackendMode, Row, Store, StoreError, Value};
pub use config::Config;
pub use database::Database;
