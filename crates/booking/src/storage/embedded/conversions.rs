//! Embedded engine value conversions.
//!
//! Pure functions for converting between SQLite values and `booking_core`
//! rows. These are testable in isolation without database access.

use booking_core::storage::{Row, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};

/// Converts a parameter into an owned SQLite value for binding.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Blob(v) => SqlValue::Blob(v.clone()),
    }
}

/// Converts a borrowed SQLite cell into a `Value`.
///
/// Text that is not valid UTF-8 is decoded lossily.
pub fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// Convert a SQLite row to a `Row`, using `columns` for the names.
///
/// Duplicate names are kept, so every result column survives a join.
pub fn row_to_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (index, name) in columns.iter().enumerate() {
        out.push(name.clone(), from_value_ref(row.get_ref(index)?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_conversion() {
        assert_eq!(to_sql_value(&Value::Null), SqlValue::Null);
        assert_eq!(to_sql_value(&Value::Integer(7)), SqlValue::Integer(7));
        assert_eq!(
            to_sql_value(&Value::Text("Ava".into())),
            SqlValue::Text("Ava".into())
        );
        assert_eq!(
            to_sql_value(&Value::Blob(vec![1, 2])),
            SqlValue::Blob(vec![1, 2])
        );
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(from_value_ref(ValueRef::Null), Value::Null);
        assert_eq!(from_value_ref(ValueRef::Real(2.5)), Value::Real(2.5));
        assert_eq!(
            from_value_ref(ValueRef::Text(b"pending")),
            Value::Text("pending".into())
        );
    }

    #[test]
    fn test_row_conversion_keeps_column_order() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let columns = vec!["id".to_string(), "n".to_string(), "missing".to_string()];
        let row = conn
            .query_row("SELECT 'a1', 3, NULL", [], |row| row_to_row(row, &columns))
            .unwrap();

        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "n", "missing"]);
        assert_eq!(row.get("n"), Some(&Value::Integer(3)));
        assert_eq!(row.get("missing"), Some(&Value::Null));
    }

    #[test]
    fn test_row_conversion_keeps_duplicate_names() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let columns = vec!["id".to_string(), "id".to_string()];
        let row = conn
            .query_row("SELECT 'cv1', 'a1'", [], |row| row_to_row(row, &columns))
            .unwrap();

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&Value::Text("cv1".into())));
        assert_eq!(row.into_iter().nth(1), Some(("id".to_string(), "a1".into())));
    }
}
