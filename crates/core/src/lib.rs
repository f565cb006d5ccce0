//! Pure core of the booking data-access layer.
//!
//! Nothing in this crate performs I/O. The `booking` crate supplies the
//! engines, the cache and the background tasks around it.

pub mod query;
pub mod sql;
pub mod storage;
