//! Evaluation of query plans over in-memory rows.

use std::cmp::Ordering;

use crate::storage::{Row, Value};

use super::plan::{CompareOp, Filter, Projection, QueryPlan, SortKey};

/// Three-valued truth, as in SQL.
///
/// `Unknown` comes from fragments the interpreter could not read or from
/// columns a row does not carry. Reads keep such rows, so results are a
/// superset of the exact answer; writes only touch rows that are `True`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    fn from_bool(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }

    /// The row may match.
    pub fn is_possible(self) -> bool {
        self != Truth::False
    }

    /// The row certainly matches.
    pub fn is_certain(self) -> bool {
        self == Truth::True
    }

    fn not(self) -> Self {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

impl Filter {
    /// Evaluates the filter against one row.
    pub fn truth(&self, row: &Row) -> Truth {
        match self {
            Filter::Compare { column, op, value } => match row.get(column) {
                None => Truth::Unknown,
                Some(cell) => Truth::from_bool(compare(cell, *op, value)),
            },
            Filter::Like {
                column,
                pattern,
                negated,
            } => match row.get(column) {
                None => Truth::Unknown,
                Some(Value::Null) => Truth::False,
                Some(cell) => Truth::from_bool(like(&cell.as_text(), pattern) != *negated),
            },
            Filter::In {
                column,
                values,
                negated,
            } => match row.get(column) {
                None => Truth::Unknown,
                Some(Value::Null) => Truth::False,
                Some(cell) => Truth::from_bool(values.iter().any(|v| cell.loose_eq(v)) != *negated),
            },
            Filter::Between {
                column,
                low,
                high,
                negated,
            } => match row.get(column) {
                None => Truth::Unknown,
                Some(cell) => {
                    let inside = compare(cell, CompareOp::Ge, low) && compare(cell, CompareOp::Le, high);
                    if cell.is_null() {
                        Truth::False
                    } else {
                        Truth::from_bool(inside != *negated)
                    }
                }
            },
            Filter::IsNull { column, negated } => match row.get(column) {
                None => Truth::Unknown,
                Some(cell) => Truth::from_bool(cell.is_null() != *negated),
            },
            Filter::And(parts) => parts.iter().fold(Truth::True, |acc, part| {
                match (acc, part.truth(row)) {
                    (Truth::False, _) | (_, Truth::False) => Truth::False,
                    (Truth::Unknown, _) | (_, Truth::Unknown) => Truth::Unknown,
                    _ => Truth::True,
                }
            }),
            Filter::Or(parts) => parts.iter().fold(Truth::False, |acc, part| {
                match (acc, part.truth(row)) {
                    (Truth::True, _) | (_, Truth::True) => Truth::True,
                    (Truth::Unknown, _) | (_, Truth::Unknown) => Truth::Unknown,
                    _ => Truth::False,
                }
            }),
            Filter::Not(inner) => inner.truth(row).not(),
            Filter::Unrecognized => Truth::Unknown,
        }
    }
}

fn compare(cell: &Value, op: CompareOp, value: &Value) -> bool {
    match op {
        CompareOp::Eq => cell.loose_eq(value),
        CompareOp::Ne => !cell.is_null() && !value.is_null() && !cell.loose_eq(value),
        CompareOp::Lt => cell.loose_cmp(value) == Some(Ordering::Less),
        CompareOp::Le => matches!(
            cell.loose_cmp(value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => cell.loose_cmp(value) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            cell.loose_cmp(value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

/// Case-insensitive `LIKE` with `%` and `_` wildcards.
pub fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            p = star_p + 1;
            t = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}

impl QueryPlan {
    /// Runs the plan over `rows`: filter, order, offset, limit, project.
    pub fn evaluate(&self, rows: &[Row]) -> Vec<Row> {
        let mut selected: Vec<&Row> = match &self.filter {
            Some(filter) => rows
                .iter()
                .filter(|row| filter.truth(row).is_possible())
                .collect(),
            None => rows.iter().collect(),
        };

        if let Projection::Count { column, alias } = &self.projection {
            let count = match column {
                Some(column) => selected
                    .iter()
                    .filter(|row| row.get(column).is_some_and(|v| !v.is_null()))
                    .count(),
                None => selected.len(),
            };
            return vec![[(alias.clone(), Value::Integer(count as i64))]
                .into_iter()
                .collect()];
        }

        if !self.order_by.is_empty() {
            selected.sort_by(|a, b| compare_rows(a, b, &self.order_by));
        }

        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);

        selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(row, &self.projection))
            .collect()
    }
}

/// Lexicographic comparison on the text form of each key column.
fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = a.get(&key.column).map(Value::as_text).unwrap_or_default();
        let right = b.get(&key.column).map(Value::as_text).unwrap_or_default();
        let ordering = if key.descending {
            right.cmp(&left)
        } else {
            left.cmp(&right)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn project(row: &Row, projection: &Projection) -> Row {
    match projection {
        Projection::Columns(columns) => columns
            .iter()
            .filter_map(|(source, alias)| row.get(source).map(|v| (alias.clone(), v.clone())))
            .collect(),
        _ => row.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment(id: &str, status: &str, date: &str) -> Row {
        [
            ("id", Value::from(id)),
            ("status", Value::from(status)),
            ("date", Value::from(date)),
        ]
        .into_iter()
        .collect()
    }

    fn sample() -> Vec<Row> {
        vec![
            appointment("a1", "pending", "2024-06-03"),
            appointment("a2", "confirmed", "2024-06-01"),
            appointment("a3", "cancelled", "2024-06-05"),
            appointment("a4", "pending", "2024-06-02"),
        ]
    }

    fn ids(rows: &[Row]) -> Vec<String> {
        rows.iter()
            .map(|r| r.get("id").map(|v| v.as_text().into_owned()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_equality_filter() {
        let plan = QueryPlan::new().filter(Filter::eq("status", "pending"));
        assert_eq!(ids(&plan.evaluate(&sample())), vec!["a1", "a4"]);
    }

    #[test]
    fn test_range_and_inequality() {
        let plan = QueryPlan::new()
            .filter(Filter::ge("date", "2024-06-02"))
            .filter(Filter::ne("status", "cancelled"));
        assert_eq!(ids(&plan.evaluate(&sample())), vec!["a1", "a4"]);
    }

    #[test]
    fn test_order_desc_with_limit() {
        let plan = QueryPlan::new().order_by("date", true).limit(2);
        assert_eq!(ids(&plan.evaluate(&sample())), vec!["a3", "a1"]);
    }

    #[test]
    fn test_order_is_lexicographic() {
        let rows: Vec<Row> = [10, 9, 100]
            .iter()
            .map(|n| [("n", Value::Integer(*n))].into_iter().collect())
            .collect();
        let sorted = QueryPlan::new().order_by("n", false).evaluate(&rows);
        let values: Vec<_> = sorted.iter().map(|r| r.get("n").cloned().unwrap()).collect();
        assert_eq!(
            values,
            vec![Value::Integer(10), Value::Integer(100), Value::Integer(9)]
        );
    }

    #[test]
    fn test_offset_then_limit() {
        let plan = QueryPlan::new().order_by("id", false).offset(1).limit(2);
        assert_eq!(ids(&plan.evaluate(&sample())), vec!["a2", "a3"]);
    }

    #[test]
    fn test_count_ignores_limit() {
        let plan = QueryPlan::new()
            .filter(Filter::eq("status", "pending"))
            .count()
            .limit(1);
        let result = plan.evaluate(&sample());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].get("count"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_unrecognized_keeps_rows() {
        let plan = QueryPlan::new().filter(Filter::Unrecognized);
        assert_eq!(plan.evaluate(&sample()).len(), 4);

        let negated = QueryPlan::new().filter(Filter::Unrecognized.negate());
        assert_eq!(negated.evaluate(&sample()).len(), 4);
    }

    #[test]
    fn test_unknown_is_still_excluded_by_known_false() {
        let plan = QueryPlan::new().filter(Filter::eq("status", "pending").and(Filter::Unrecognized));
        assert_eq!(ids(&plan.evaluate(&sample())), vec!["a1", "a4"]);
    }

    #[test]
    fn test_missing_column_is_unknown() {
        let row: Row = [("id", "x")].into_iter().collect();
        assert_eq!(Filter::eq("status", "pending").truth(&row), Truth::Unknown);
        assert_eq!(Filter::eq("id", "x").truth(&row), Truth::True);
    }

    #[test]
    fn test_null_handling() {
        let row: Row = [("notes", Value::Null)].into_iter().collect();
        assert_eq!(Filter::is_null("notes").truth(&row), Truth::True);
        assert_eq!(Filter::eq("notes", Value::Null).truth(&row), Truth::False);
        assert_eq!(Filter::ne("notes", "x").truth(&row), Truth::False);
    }

    #[test]
    fn test_in_list_and_or() {
        let plan = QueryPlan::new().filter(Filter::in_list("status", ["confirmed", "cancelled"]));
        assert_eq!(ids(&plan.evaluate(&sample())), vec!["a2", "a3"]);

        let plan = QueryPlan::new().filter(Filter::eq("id", "a1").or(Filter::eq("id", "a3")));
        assert_eq!(ids(&plan.evaluate(&sample())), vec!["a1", "a3"]);
    }

    #[test]
    fn test_projection_renames_columns() {
        let plan = QueryPlan {
            projection: Projection::Columns(vec![("id".into(), "appointment_id".into())]),
            ..QueryPlan::new()
        };
        let rows = plan.evaluate(&sample()[..1]);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["appointment_id"]);
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like("Ava Smith", "ava%"));
        assert!(like("Ava Smith", "%SMITH"));
        assert!(like("Ava Smith", "%a s%"));
        assert!(like("cat", "c_t"));
        assert!(!like("cart", "c_t"));
        assert!(like("", "%"));
        assert!(!like("abc", "abd%"));
    }
}
