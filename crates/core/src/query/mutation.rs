//! Optimistic write emulation.
//!
//! Recognized `INSERT`, `UPDATE` and `DELETE` shapes are turned into a
//! [`Mutation`] that can be applied to a cached row list before the
//! authoritative store acknowledges the write. Shapes that cannot be applied
//! faithfully are not emulated at all: the cache then catches up on the next
//! refresh instead of holding a guess.

use crate::sql::{count_placeholders, extract_table_from_tokens, tokenize, StatementKind, Token};
use crate::storage::{identity_column, Row, Value};

use super::parse::{parse_filter, ParamCursor, Scope};
use super::plan::Filter;

/// What an insert does when a row with the same identity already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Plain insert. The server will reject the duplicate.
    Reject,
    /// `INSERT OR IGNORE` / `ON CONFLICT DO NOTHING`.
    Ignore,
    /// `INSERT OR REPLACE` / `ON CONFLICT DO UPDATE`.
    Merge,
}

/// A write that can be mirrored into the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert {
        table: String,
        rows: Vec<Row>,
        on_conflict: OnConflict,
    },
    Update {
        table: String,
        changes: Row,
        filter: Option<Filter>,
    },
    Delete {
        table: String,
        filter: Option<Filter>,
    },
}

impl Mutation {
    /// Recognizes a write statement. `None` when the shape is not emulated.
    pub fn parse(sql: &str, params: &[Value]) -> Option<Self> {
        let tokens = tokenize(sql);
        let table = extract_table_from_tokens(&tokens)?;
        let tokens = trim_statement(&tokens);

        match StatementKind::from_tokens(tokens) {
            StatementKind::Insert => parse_insert(tokens, params, table),
            StatementKind::Update => parse_update(tokens, params, table),
            StatementKind::Delete => parse_delete(tokens, params, table),
            StatementKind::Select | StatementKind::Other => None,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Mutation::Insert { table, .. }
            | Mutation::Update { table, .. }
            | Mutation::Delete { table, .. } => table,
        }
    }

    /// Applies the mutation to `rows`, returning the number of rows touched.
    pub fn apply(&self, rows: &mut Vec<Row>) -> usize {
        match self {
            Mutation::Insert {
                table,
                rows: new_rows,
                on_conflict,
            } => {
                let identity = identity_column(table);
                let mut touched = 0;
                for new_row in new_rows {
                    let existing = new_row
                        .get(identity)
                        .filter(|key| !key.is_null())
                        .and_then(|key| {
                            rows.iter()
                                .position(|row| row.get(identity).is_some_and(|v| v.loose_eq(key)))
                        });
                    match (existing, on_conflict) {
                        (Some(index), OnConflict::Merge) => {
                            rows[index].merge(new_row);
                            touched += 1;
                        }
                        (Some(_), _) => {}
                        (None, _) => {
                            rows.push(new_row.clone());
                            touched += 1;
                        }
                    }
                }
                touched
            }
            Mutation::Update {
                changes, filter, ..
            } => {
                let mut touched = 0;
                for row in rows.iter_mut().filter(|row| selects(filter, row)) {
                    row.merge(changes);
                    touched += 1;
                }
                touched
            }
            Mutation::Delete { filter, .. } => {
                let before = rows.len();
                rows.retain(|row| !selects(filter, row));
                before - rows.len()
            }
        }
    }
}

/// Writes only touch rows the filter certainly matches.
fn selects(filter: &Option<Filter>, row: &Row) -> bool {
    filter.as_ref().is_none_or(|f| f.truth(row).is_certain())
}

/// Drops a trailing `;` and any `RETURNING` tail.
fn trim_statement(tokens: &[Token]) -> &[Token] {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Semicolon if depth == 0 => return &tokens[..i],
            t if depth == 0 && t.is_keyword("RETURNING") => return &tokens[..i],
            _ => {}
        }
    }
    tokens
}

/// Index of the `)` closing the `(` at `open`.
fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_commas(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// A single literal or placeholder. Expressions yield `None` after their
/// placeholders are skipped.
fn simple_value(tokens: &[Token], cursor: &mut ParamCursor<'_>) -> Option<Value> {
    let value = match tokens {
        [Token::Placeholder] => return Some(cursor.take()),
        [Token::Str(s)] => Some(Value::Text(s.clone())),
        [Token::Number(n)] => n
            .parse::<i64>()
            .map(Value::Integer)
            .ok()
            .or_else(|| n.parse::<f64>().ok().map(Value::Real)),
        [Token::Op(minus), Token::Number(n)] if minus == "-" => n
            .parse::<i64>()
            .map(|v| Value::Integer(-v))
            .ok()
            .or_else(|| n.parse::<f64>().ok().map(|v| Value::Real(-v))),
        [t] if t.is_keyword("NULL") => Some(Value::Null),
        [t] if t.is_keyword("TRUE") => Some(Value::Integer(1)),
        [t] if t.is_keyword("FALSE") => Some(Value::Integer(0)),
        _ => None,
    };
    if value.is_none() {
        cursor.seek(cursor.position() + count_placeholders(tokens));
    }
    value
}

fn parse_insert(tokens: &[Token], params: &[Value], table: String) -> Option<Mutation> {
    let mut on_conflict = OnConflict::Reject;
    if tokens.first().is_some_and(|t| t.is_keyword("REPLACE")) {
        on_conflict = OnConflict::Merge;
    }
    if tokens.get(1).is_some_and(|t| t.is_keyword("OR")) {
        on_conflict = match tokens.get(2) {
            Some(t) if t.is_keyword("REPLACE") => OnConflict::Merge,
            Some(t) if t.is_keyword("IGNORE") => OnConflict::Ignore,
            _ => OnConflict::Reject,
        };
    }

    let into = tokens.iter().position(|t| t.is_keyword("INTO"))?;
    let mut pos = into + 2;
    if matches!(tokens.get(pos), Some(Token::Dot)) {
        pos += 2;
    }
    if tokens.get(pos) != Some(&Token::LParen) {
        return None;
    }
    let close = matching_paren(tokens, pos)?;
    let columns: Vec<String> = split_commas(&tokens[pos + 1..close])
        .into_iter()
        .map(|c| match c {
            [name] => name.ident().map(str::to_string),
            _ => None,
        })
        .collect::<Option<_>>()?;

    pos = close + 1;
    if !tokens.get(pos).is_some_and(|t| t.is_keyword("VALUES")) {
        return None;
    }
    pos += 1;

    let mut cursor = ParamCursor::new(params);
    let mut rows = Vec::new();
    loop {
        if tokens.get(pos) != Some(&Token::LParen) {
            return None;
        }
        let close = matching_paren(tokens, pos)?;
        let items = split_commas(&tokens[pos + 1..close]);
        if items.len() != columns.len() {
            return None;
        }
        let mut row = Row::new();
        for (column, item) in columns.iter().zip(items) {
            if let Some(value) = simple_value(item, &mut cursor) {
                row.set(column.clone(), value);
            }
        }
        rows.push(row);

        pos = close + 1;
        if tokens.get(pos) == Some(&Token::Comma) {
            pos += 1;
        } else {
            break;
        }
    }

    match tokens.get(pos) {
        None => {}
        Some(t) if t.is_keyword("ON") => {
            let tail = &tokens[pos..];
            let nothing = tail
                .windows(2)
                .any(|w| w[0].is_keyword("DO") && w[1].is_keyword("NOTHING"));
            let update = tail
                .windows(2)
                .any(|w| w[0].is_keyword("DO") && w[1].is_keyword("UPDATE"));
            on_conflict = match (nothing, update) {
                (true, _) => OnConflict::Ignore,
                (_, true) => OnConflict::Merge,
                _ => return None,
            };
        }
        Some(_) => return None,
    }

    Some(Mutation::Insert {
        table,
        rows,
        on_conflict,
    })
}

fn parse_update(tokens: &[Token], params: &[Value], table: String) -> Option<Mutation> {
    let set = tokens.iter().position(|t| t.is_keyword("SET"))?;
    let mut depth = 0usize;
    let mut where_at = None;
    for (i, token) in tokens.iter().enumerate().skip(set + 1) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            t if depth == 0 && t.is_keyword("WHERE") => {
                where_at = Some(i);
                break;
            }
            t if depth == 0 && t.is_keyword("FROM") => return None,
            _ => {}
        }
    }

    let assignments_end = where_at.unwrap_or(tokens.len());
    let identity = identity_column(&table);
    let mut cursor = ParamCursor::new(params);
    let mut changes = Row::new();

    for assignment in split_commas(&tokens[set + 1..assignments_end]) {
        let (column, rest) = match assignment {
            [name, Token::Op(eq), rest @ ..] if eq == "=" => (name.ident()?, rest),
            _ => return None,
        };
        if column.eq_ignore_ascii_case(identity) {
            return None;
        }
        let value = simple_value(rest, &mut cursor)?;
        changes.set(column, value);
    }

    let filter = match where_at {
        Some(i) => {
            let filter = parse_filter(&tokens[i + 1..], &mut cursor, &Scope::of_table(&table));
            if filter.has_unrecognized() {
                return None;
            }
            Some(filter)
        }
        None => None,
    };

    Some(Mutation::Update {
        table,
        changes,
        filter,
    })
}

fn parse_delete(tokens: &[Token], params: &[Value], table: String) -> Option<Mutation> {
    let from = tokens.iter().position(|t| t.is_keyword("FROM"))?;
    let mut pos = from + 2;
    if matches!(tokens.get(pos), Some(Token::Dot)) {
        pos += 2;
    }

    let filter = match tokens.get(pos) {
        None => None,
        Some(t) if t.is_keyword("WHERE") => {
            let mut cursor = ParamCursor::new(params);
            let filter = parse_filter(&tokens[pos + 1..], &mut cursor, &Scope::of_table(&table));
            if filter.has_unrecognized() {
                return None;
            }
            Some(filter)
        }
        Some(_) => return None,
    };

    Some(Mutation::Delete { table, filter })
}
