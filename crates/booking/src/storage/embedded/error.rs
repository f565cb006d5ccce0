//! Embedded engine error mapping.
//!
//! Maps `rusqlite::Error` to `StoreError` from `booking_core::storage`.

use booking_core::storage::StoreError;

/// Maps a rusqlite error to a StoreError.
///
/// # Error Mapping
///
/// - `SQLITE_CANTOPEN`, `SQLITE_IOERR`, `SQLITE_FULL`, `SQLITE_READONLY` → `StoreError::Io`
/// - All other errors → `StoreError::Query`
pub fn map_rusqlite_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if matches!(
                sqlite_err.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::SystemIoFailure
                    | rusqlite::ErrorCode::DiskFull
                    | rusqlite::ErrorCode::ReadOnly
            ) =>
        {
            StoreError::Io(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}

/// True when `ALTER TABLE ... ADD COLUMN` failed because the column exists.
pub fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            message.to_ascii_lowercase().contains("duplicate column name")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn failure(code: rusqlite::ErrorCode, extended_code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code,
                extended_code,
            },
            Some(message.to_string()),
        )
    }

    #[test]
    fn test_cannot_open_maps_to_io() {
        let err = failure(
            rusqlite::ErrorCode::CannotOpen,
            ffi::SQLITE_CANTOPEN,
            "unable to open database file",
        );
        assert!(matches!(map_rusqlite_error(err), StoreError::Io(_)));
    }

    #[test]
    fn test_syntax_error_maps_to_query() {
        let err = failure(
            rusqlite::ErrorCode::Unknown,
            ffi::SQLITE_ERROR,
            "near \"SELEC\": syntax error",
        );
        assert!(matches!(map_rusqlite_error(err), StoreError::Query(_)));
    }

    #[test]
    fn test_other_errors_map_to_query() {
        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(map_rusqlite_error(err), StoreError::Query(_)));
    }

    #[test]
    fn test_duplicate_column_detection() {
        let err = failure(
            rusqlite::ErrorCode::Unknown,
            ffi::SQLITE_ERROR,
            "duplicate column name: notes",
        );
        assert!(is_duplicate_column(&err));

        let err = failure(
            rusqlite::ErrorCode::Unknown,
            ffi::SQLITE_ERROR,
            "no such table: customers",
        );
        assert!(!is_duplicate_column(&err));
    }
}
