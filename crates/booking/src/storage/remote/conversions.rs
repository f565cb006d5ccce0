//! Remote engine value conversions.
//!
//! Parameters are bound by variant. Result cells are decoded by the server's
//! column type, since Postgres will not hand an `INT4` to a `String` decoder.

use booking_core::storage::{Row, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo, ValueRef};

/// How a column's cells are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Bool,
    Bytes,
    TimestampTz,
    Timestamp,
    Date,
    Text,
}

/// Maps a Postgres type name to its decoding.
///
/// Unknown types fall back to text; cells that fail to decode become `NULL`.
pub fn cell_kind(type_name: &str) -> CellKind {
    match type_name {
        "INT2" => CellKind::SmallInt,
        "INT4" => CellKind::Int,
        "INT8" => CellKind::BigInt,
        "FLOAT4" => CellKind::Float,
        "FLOAT8" => CellKind::Double,
        "BOOL" => CellKind::Bool,
        "BYTEA" => CellKind::Bytes,
        "TIMESTAMPTZ" => CellKind::TimestampTz,
        "TIMESTAMP" => CellKind::Timestamp,
        "DATE" => CellKind::Date,
        _ => CellKind::Text,
    }
}

/// Binds one parameter onto a query.
///
/// `NULL` is sent as a text-typed null, which Postgres coerces for text
/// columns only.
pub fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Integer(v) => query.bind(*v),
        Value::Real(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Blob(v) => query.bind(v.as_slice()),
    }
}

/// Timestamps are exposed as RFC 3339 text, matching what the embedded
/// engine stores.
pub fn timestamp_text(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert a Postgres row to a `Row`.
pub fn pg_row_to_row(row: &PgRow) -> Row {
    let mut out = Row::new();
    for column in row.columns() {
        let value = decode_cell(row, column.ordinal(), cell_kind(column.type_info().name()));
        out.push(column.name(), value);
    }
    out
}

fn decode_cell(row: &PgRow, index: usize, kind: CellKind) -> Value {
    let is_null = row
        .try_get_raw(index)
        .map(|raw| raw.is_null())
        .unwrap_or(true);
    if is_null {
        return Value::Null;
    }

    let decoded = match kind {
        CellKind::SmallInt => row.try_get::<i16, _>(index).map(|v| Value::Integer(v.into())),
        CellKind::Int => row.try_get::<i32, _>(index).map(|v| Value::Integer(v.into())),
        CellKind::BigInt => row.try_get::<i64, _>(index).map(Value::Integer),
        CellKind::Float => row.try_get::<f32, _>(index).map(|v| Value::Real(v.into())),
        CellKind::Double => row.try_get::<f64, _>(index).map(Value::Real),
        CellKind::Bool => row.try_get::<bool, _>(index).map(Value::from),
        CellKind::Bytes => row.try_get::<Vec<u8>, _>(index).map(Value::Blob),
        CellKind::TimestampTz => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|v| Value::Text(timestamp_text(v))),
        CellKind::Timestamp => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|v| Value::Text(timestamp_text(v.and_utc()))),
        CellKind::Date => row
            .try_get::<NaiveDate, _>(index)
            .map(|v| Value::Text(v.to_string())),
        CellKind::Text => row.try_get::<String, _>(index).map(Value::Text),
    };

    decoded.unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_integer_types() {
        assert_eq!(cell_kind("INT2"), CellKind::SmallInt);
        assert_eq!(cell_kind("INT4"), CellKind::Int);
        assert_eq!(cell_kind("INT8"), CellKind::BigInt);
    }

    #[test]
    fn test_temporal_types() {
        assert_eq!(cell_kind("TIMESTAMPTZ"), CellKind::TimestampTz);
        assert_eq!(cell_kind("TIMESTAMP"), CellKind::Timestamp);
        assert_eq!(cell_kind("DATE"), CellKind::Date);
    }

    #[test]
    fn test_text_is_the_fallback() {
        assert_eq!(cell_kind("TEXT"), CellKind::Text);
        assert_eq!(cell_kind("VARCHAR"), CellKind::Text);
        assert_eq!(cell_kind("UUID"), CellKind::Text);
    }

    #[test]
    fn test_timestamp_text_is_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();
        assert_eq!(timestamp_text(ts), "2024-06-01T09:30:00.000Z");
    }
}
