//! Table cache used in remote mode.
//!
//! Holds the in-memory mirror of every tracked table and the refresh
//! bookkeeping around it. The store that keeps it in sync with the server
//! lives in `storage::cached`.

mod table_cache;

pub use table_cache::{CacheState, RefreshTicket, TableCache, TableStatus};
