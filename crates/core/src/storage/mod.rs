mod error;
mod mode;
mod tables;
mod traits;
mod types;

pub use error::{Result, StoreError};
pub use mode::{is_networked_url, select_backend, BackendMode};
pub use tables::{identity_column, is_tracked, TRACKED_TABLES};
pub use traits::{RemoteBackend, Store};
pub use types::{Row, Value};
