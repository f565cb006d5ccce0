//! Remote engine error mapping.
//!
//! Maps `sqlx::Error` to `StoreError` from `booking_core::storage`.

use booking_core::storage::StoreError;

/// SQLSTATE raised when `ADD COLUMN` names an existing column.
const DUPLICATE_COLUMN: &str = "42701";

/// Maps a sqlx error to a StoreError.
///
/// # Error Mapping
///
/// - Unparseable connection options → `StoreError::Configuration`
/// - Socket, TLS and pool failures → `StoreError::Connectivity`
/// - All other errors → `StoreError::Query`
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Configuration(_) => StoreError::Configuration(err.to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Connectivity(err.to_string()),
        _ => StoreError::Query(err.to_string()),
    }
}

/// True when `ALTER TABLE ... ADD COLUMN` failed because the column exists.
pub fn is_duplicate_column(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(DUPLICATE_COLUMN),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_mapping() {
        let err = sqlx::Error::Configuration("invalid port number".into());
        assert!(matches!(map_sqlx_error(err), StoreError::Configuration(_)));
    }

    #[test]
    fn test_pool_errors_map_to_connectivity() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StoreError::Connectivity(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            StoreError::Connectivity(_)
        ));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            map_sqlx_error(sqlx::Error::Io(io)),
            StoreError::Connectivity(_)
        ));
    }

    #[test]
    fn test_other_errors_map_to_query() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StoreError::Query(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::ColumnNotFound("status".into())),
            StoreError::Query(_)
        ));
    }

    #[test]
    fn test_non_database_errors_are_not_duplicate_columns() {
        assert!(!is_duplicate_column(&sqlx::Error::RowNotFound));
        assert!(!is_duplicate_column(&sqlx::Error::PoolTimedOut));
    }
}
