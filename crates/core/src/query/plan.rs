//! Query plan descriptors.
//!
//! A [`QueryPlan`] is the explicit form of the query shapes the application
//! issues: filters, ordering, paging and projection. Plans are built either
//! from SQL text with [`QueryPlan::parse`](super::QueryPlan::parse) or
//! directly with the builder methods below.

use crate::storage::Value;

/// Comparison operator of a [`Filter::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" | "==" => Some(CompareOp::Eq),
            "!=" | "<>" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }
}

/// Row predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    Like {
        column: String,
        pattern: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// A fragment the interpreter does not understand. Evaluates to unknown,
    /// so it never excludes a row on its own.
    Unrecognized,
}

impl Filter {
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Filter::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Like {
            column: column.into(),
            pattern: pattern.into(),
            negated: false,
        }
    }

    pub fn in_list<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull {
            column: column.into(),
            negated: false,
        }
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut parts) => {
                parts.push(other);
                Filter::Or(parts)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// True if any part of the filter was not understood.
    pub fn has_unrecognized(&self) -> bool {
        match self {
            Filter::Unrecognized => true,
            Filter::And(parts) | Filter::Or(parts) => parts.iter().any(Filter::has_unrecognized),
            Filter::Not(inner) => inner.has_unrecognized(),
            _ => false,
        }
    }
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

/// What the query returns for each surviving row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// Whole rows.
    #[default]
    All,
    /// Named columns as `(source, output name)` pairs.
    Columns(Vec<(String, String)>),
    /// A single row holding the number of surviving rows. With a column,
    /// only rows where it is not `NULL` count.
    Count {
        column: Option<String>,
        alias: String,
    },
}

/// A complete read: filter, order, page and project.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPlan {
    pub filter: Option<Filter>,
    pub order_by: Vec<SortKey>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub projection: Projection,
}

impl QueryPlan {
    /// A plan returning every row unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter, combining with any existing one by `AND`.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order_by.push(SortKey {
            column: column.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Projection::Columns(
            columns
                .into_iter()
                .map(|c| {
                    let c = c.into();
                    (c.clone(), c)
                })
                .collect(),
        );
        self
    }

    /// Turns the plan into `COUNT(*)` returning a `count` column.
    pub fn count(mut self) -> Self {
        self.projection = Projection::Count {
            column: None,
            alias: "count".to_string(),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_flattens() {
        let filter = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));
        match filter {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_filter_combines() {
        let plan = QueryPlan::new()
            .filter(Filter::eq("status", "pending"))
            .filter(Filter::ge("date", "2024-06-01"));
        assert!(matches!(plan.filter, Some(Filter::And(ref parts)) if parts.len() == 2));
    }

    #[test]
    fn test_has_unrecognized_nested() {
        let filter = Filter::eq("a", 1).or(Filter::Unrecognized.negate());
        assert!(filter.has_unrecognized());
        assert!(!Filter::eq("a", 1).has_unrecognized());
    }

    #[test]
    fn test_operator_symbols() {
        assert_eq!(CompareOp::from_symbol("<>"), Some(CompareOp::Ne));
        assert_eq!(CompareOp::from_symbol(">="), Some(CompareOp::Ge));
        assert_eq!(CompareOp::from_symbol("||"), None);
    }
}
