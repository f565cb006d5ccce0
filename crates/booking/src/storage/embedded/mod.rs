//! Embedded storage backend implementation.
//!
//! An in-process SQLite database using `rusqlite`, persisted by snapshotting
//! the whole image to a single file after each mutation.

mod conversions;
mod error;
mod store;

pub use store::EmbeddedStore;
