use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// A scalar cell value as stored by either backend.
///
/// Booleans have no variant of their own: they are stored as `Integer(0|1)`
/// the same way both engines persist them in this schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value. Text only converts when it parses cleanly.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null | Value::Blob(_) => None,
        }
    }

    /// Integer view, used for `LIMIT`/`OFFSET` operands.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text rendering used for lexicographic ordering and `LIKE` matching.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Integer(v) => Cow::Owned(v.to_string()),
            Value::Real(v) => Cow::Owned(v.to_string()),
            Value::Text(s) => Cow::Borrowed(s),
            Value::Blob(b) => String::from_utf8_lossy(b),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Real(_))
    }

    /// SQL-flavoured equality with the loose typing both engines apply to
    /// parameters: `1`, `1.0` and `'1'` compare equal when one side is a
    /// number. `NULL` never equals anything.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (a, b) if a.is_numeric() || b.is_numeric() => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_text() == b.as_text(),
            },
            (a, b) => a.as_text() == b.as_text(),
        }
    }

    /// Ordering used by range filters. Numeric when either side is a number
    /// and both convert, lexicographic otherwise. `None` involving `NULL`.
    pub fn loose_cmp(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        if self.is_numeric() || other.is_numeric() {
            if let (Some(x), Some(y)) = (self.as_f64(), other.as_f64()) {
                return x.partial_cmp(&y);
            }
        }
        Some(self.as_text().cmp(&other.as_text()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.as_text()),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One result row: column names in select order, each with its value.
///
/// Column lookups ignore ASCII case, matching how both engines resolve
/// unquoted identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.position(column).map(|i| &self.cells[i].1)
    }

    /// Sets a column, replacing an existing value in place or appending.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.position(&column) {
            Some(i) => self.cells[i].1 = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Appends a column even if one with the same name exists, as a join
    /// returning two `id` columns does. Lookups see the first one.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.cells.push((column.into(), value.into()));
    }

    /// Copies every column of `other` into this row.
    pub fn merge(&mut self, other: &Row) {
        for (column, value) in &other.cells {
            self.set(column.clone(), value.clone());
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.cells
            .iter()
            .position(|(c, _)| c.eq_ignore_ascii_case(column))
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_eq_crosses_numeric_and_text() {
        assert!(Value::Integer(1).loose_eq(&Value::Text("1".into())));
        assert!(Value::Real(2.0).loose_eq(&Value::Integer(2)));
        assert!(Value::from(true).loose_eq(&Value::Integer(1)));
        assert!(!Value::Text("01".into()).loose_eq(&Value::Text("1".into())));
    }

    #[test]
    fn test_null_never_equal() {
        assert!(!Value::Null.loose_eq(&Value::Null));
        assert!(!Value::Null.loose_eq(&Value::Integer(0)));
        assert_eq!(Value::Null.loose_cmp(&Value::Integer(0)), None);
    }

    #[test]
    fn test_loose_cmp_numeric_vs_lexicographic() {
        assert_eq!(
            Value::Integer(9).loose_cmp(&Value::Integer(10)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Text("9".into()).loose_cmp(&Value::Text("10".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Text("2024-05-01".into()).loose_cmp(&Value::Text("2024-04-30".into())),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_row_lookup_ignores_case() {
        let row: Row = [("Status", "pending")].into_iter().collect();
        assert_eq!(row.get("status"), Some(&Value::Text("pending".into())));
        assert!(row.contains("STATUS"));
    }

    #[test]
    fn test_row_set_replaces_in_place() {
        let mut row: Row = [("id", Value::from("a1")), ("status", Value::from("pending"))]
            .into_iter()
            .collect();
        row.set("status", "confirmed");
        row.set("notes", Value::Null);

        let columns: Vec<_> = row.columns().collect();
        assert_eq!(columns, vec!["id", "status", "notes"]);
        assert_eq!(row.get("status"), Some(&Value::from("confirmed")));
    }

    #[test]
    fn test_row_push_keeps_duplicate_columns() {
        let mut row = Row::new();
        row.push("id", "cv1");
        row.push("id", "a1");

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&Value::from("cv1")));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "id"]);
    }

    #[test]
    fn test_row_serializes_as_ordered_object() {
        let row: Row = [("id", Value::from("s1")), ("is_active", Value::from(true))]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"id":"s1","is_active":1}"#);
    }

    #[test]
    fn test_value_deserializes_json_scalars() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 3, 1.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Integer(3),
                Value::Real(1.5),
                Value::Text("x".into())
            ]
        );
    }
}
