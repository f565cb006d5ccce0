use thiserror::Error;

/// Errors surfaced by the data-access layer.
///
/// Missing rows are never errors: reads return `None` or an empty list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Remote mode selected without a usable connection string.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The remote server could not be reached or a connection could not be acquired.
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    /// The embedded snapshot or its directory could not be read or written.
    #[error("I/O error: {0}")]
    Io(String),
    /// A statement was rejected by the engine.
    #[error("Query error: {0}")]
    Query(String),
}

impl StoreError {
    /// Startup errors after which the process must not serve traffic.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Configuration(_) | StoreError::Connectivity(_)
        )
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Result type for data-access operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let error = StoreError::Configuration("DATABASE_URL is not set".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: DATABASE_URL is not set"
        );
    }

    #[test]
    fn test_connectivity_display() {
        let error = StoreError::Connectivity("timeout after 30s".to_string());
        assert_eq!(error.to_string(), "Connectivity error: timeout after 30s");
    }

    #[test]
    fn test_io_display() {
        let error = StoreError::Io("permission denied".to_string());
        assert_eq!(error.to_string(), "I/O error: permission denied");
    }

    #[test]
    fn test_query_display() {
        let error = StoreError::Query("no such table: staf".to_string());
        assert_eq!(error.to_string(), "Query error: no such table: staf");
    }

    #[test]
    fn test_only_startup_errors_are_fatal() {
        assert!(StoreError::Configuration(String::new()).is_fatal());
        assert!(StoreError::Connectivity(String::new()).is_fatal());
        assert!(!StoreError::Io(String::new()).is_fatal());
        assert!(!StoreError::Query(String::new()).is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: StoreError = std::io::Error::other("disk full").into();
        assert_eq!(err, StoreError::Io("disk full".to_string()));
    }
}
