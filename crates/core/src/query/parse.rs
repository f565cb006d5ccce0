//! Recognition of SQL text into [`QueryPlan`]s.
//!
//! Only the query shapes the application issues are understood. Anything
//! else is skipped: an unknown `WHERE` fragment becomes
//! [`Filter::Unrecognized`] and an unknown clause is ignored, so the plan
//! returns a superset of the exact answer rather than failing.
//!
//! Placeholders are bound strictly in textual order. Every clause, and every
//! fragment that is skipped, still consumes the placeholders it contains.
//!
//! Columns qualified with anything other than the `FROM` table or its alias
//! belong to a joined table the cache cannot see, and are treated as
//! unknown.

use crate::sql::{count_placeholders, tokenize, Token};
use crate::storage::Value;

use super::plan::{CompareOp, Filter, Projection, QueryPlan, SortKey};

/// Hands out positional parameters in order. Missing ones read as `NULL`.
#[derive(Debug)]
pub(crate) struct ParamCursor<'a> {
    params: &'a [Value],
    next: usize,
}

impl<'a> ParamCursor<'a> {
    pub(crate) fn new(params: &'a [Value]) -> Self {
        Self { params, next: 0 }
    }

    pub(crate) fn take(&mut self) -> Value {
        let value = self.params.get(self.next).cloned().unwrap_or(Value::Null);
        self.next += 1;
        value
    }

    pub(crate) fn position(&self) -> usize {
        self.next
    }

    pub(crate) fn seek(&mut self, position: usize) {
        self.next = position;
    }
}

/// Names a statement's target table answers to: the table itself and its
/// alias. An empty scope accepts every qualifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Scope {
    names: Vec<String>,
}

const JOIN_KEYWORDS: [&str; 11] = [
    "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL", "OUTER", "LATERAL", "ON",
    "USING",
];

impl Scope {
    pub(crate) fn of_table(table: &str) -> Self {
        Self {
            names: vec![table.to_string()],
        }
    }

    /// Reads `table [AS] alias` or `(subquery) [AS] alias` from the start of
    /// a `FROM` body.
    fn from_clause(tokens: &[Token]) -> Self {
        let mut names = Vec::new();
        let mut i = 0;

        match tokens.first() {
            Some(Token::LParen) => {
                let mut depth = 0usize;
                while let Some(token) = tokens.get(i) {
                    i += 1;
                    match token {
                        Token::LParen => depth += 1,
                        Token::RParen => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Some(first) => {
                let Some(mut name) = first.ident() else {
                    return Self::default();
                };
                i = 1;
                while let (Some(Token::Dot), Some(part)) =
                    (tokens.get(i), tokens.get(i + 1).and_then(Token::ident))
                {
                    name = part;
                    i += 2;
                }
                names.push(name.to_string());
            }
            None => return Self::default(),
        }

        if tokens.get(i).is_some_and(|t| t.is_keyword("AS")) {
            i += 1;
        }
        if let Some(token) = tokens.get(i) {
            let is_join = JOIN_KEYWORDS.iter().any(|k| token.is_keyword(k));
            if let (Some(alias), false) = (token.ident(), is_join) {
                names.push(alias.to_string());
            }
        }
        Self { names }
    }

    fn accepts(&self, qualifier: &str) -> bool {
        self.names.is_empty() || self.names.iter().any(|n| n.eq_ignore_ascii_case(qualifier))
    }
}

impl QueryPlan {
    /// Recognizes a `SELECT` statement. Other statements yield an
    /// unfiltered plan.
    pub fn parse(sql: &str, params: &[Value]) -> Self {
        parse_select(&tokenize(sql), params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Projection,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Offset,
    Trailing,
}

fn parse_select(tokens: &[Token], params: &[Value]) -> QueryPlan {
    let mut plan = QueryPlan::new();
    if !tokens.first().is_some_and(|t| t.is_keyword("SELECT")) {
        return plan;
    }

    let clauses = split_clauses(&tokens[1..]);
    let scope = clauses
        .iter()
        .find(|(clause, _)| *clause == Clause::From)
        .map(|(_, body)| Scope::from_clause(body))
        .unwrap_or_default();

    let mut cursor = ParamCursor::new(params);
    for (clause, body) in clauses {
        let start = cursor.position();
        match clause {
            Clause::Projection => plan.projection = parse_projection(body, &scope),
            Clause::Where => plan.filter = Some(parse_filter(body, &mut cursor, &scope)),
            Clause::OrderBy => plan.order_by = parse_order(body, &scope),
            Clause::Limit => parse_limit(body, &mut cursor, &mut plan),
            Clause::Offset => {
                if let Some(offset) = parse_count(body, &mut cursor) {
                    plan.offset = Some(offset);
                }
            }
            Clause::From | Clause::GroupBy | Clause::Having | Clause::Trailing => {}
        }
        cursor.seek(start + count_placeholders(body));
    }

    plan
}

/// Splits the tokens after `SELECT` into top-level clauses.
fn split_clauses(tokens: &[Token]) -> Vec<(Clause, &[Token])> {
    let mut clauses = Vec::new();
    let mut current = Clause::Projection;
    let mut start = 0;
    let mut depth = 0usize;
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Semicolon if depth == 0 => {
                clauses.push((current, &tokens[start..i]));
                return clauses;
            }
            token if depth == 0 && current != Clause::Trailing => {
                let next = if token.is_keyword("FROM") {
                    Some((Clause::From, 1))
                } else if token.is_keyword("WHERE") {
                    Some((Clause::Where, 1))
                } else if token.is_keyword("GROUP") {
                    Some((Clause::GroupBy, 2))
                } else if token.is_keyword("HAVING") {
                    Some((Clause::Having, 1))
                } else if token.is_keyword("ORDER") {
                    Some((Clause::OrderBy, 2))
                } else if token.is_keyword("LIMIT") {
                    Some((Clause::Limit, 1))
                } else if token.is_keyword("OFFSET") {
                    Some((Clause::Offset, 1))
                } else if token.is_keyword("UNION")
                    || token.is_keyword("EXCEPT")
                    || token.is_keyword("INTERSECT")
                {
                    Some((Clause::Trailing, 1))
                } else {
                    None
                };

                if let Some((clause, width)) = next {
                    clauses.push((current, &tokens[start..i]));
                    current = clause;
                    start = (i + width).min(tokens.len());
                    i = start;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    clauses.push((current, &tokens[start..]));
    clauses
}

/// Splits `tokens` at top-level commas.
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

/// Reads `col` or `qualifier.col` at the start of `tokens`, returning the
/// column name and the number of tokens used. A qualifier outside `scope`
/// yields `None`.
fn column_ref(tokens: &[Token], scope: &Scope) -> Option<(String, usize)> {
    let first = tokens.first()?.ident()?;
    if matches!(tokens.get(1), Some(Token::LParen)) {
        return None;
    }
    match (tokens.get(1), tokens.get(2).and_then(Token::ident)) {
        (Some(Token::Dot), Some(column)) => {
            scope.accepts(first).then(|| (column.to_string(), 3))
        }
        _ => Some((first.to_string(), 1)),
    }
}

/// Parses an optional `[AS] alias` tail that must consume all of `tokens`.
fn alias(tokens: &[Token]) -> Option<Option<String>> {
    match tokens {
        [] => Some(None),
        [t, name] if t.is_keyword("AS") => name.ident().map(|n| Some(n.to_string())),
        [Token::Str(name)] => Some(Some(name.clone())),
        [name] => name.ident().map(|n| Some(n.to_string())),
        _ => None,
    }
}

fn parse_projection(tokens: &[Token], scope: &Scope) -> Projection {
    if tokens.first().is_some_and(|t| t.is_keyword("DISTINCT")) {
        return Projection::All;
    }
    let items = split_commas(tokens);

    if let [item] = items.as_slice() {
        if let Some(count) = parse_count_item(item, scope) {
            return count;
        }
    }

    let mut columns = Vec::new();
    for item in items {
        match item {
            [Token::Star] | [_, Token::Dot, Token::Star] => return Projection::All,
            _ => {}
        }
        let Some((column, used)) = column_ref(item, scope) else {
            return Projection::All;
        };
        let Some(name) = alias(&item[used..]) else {
            return Projection::All;
        };
        columns.push((column.clone(), name.unwrap_or(column)));
    }
    Projection::Columns(columns)
}

/// `COUNT(*)` or `COUNT(col)`, optionally aliased.
fn parse_count_item(item: &[Token], scope: &Scope) -> Option<Projection> {
    let (head, rest) = item.split_first()?;
    if !head.is_keyword("COUNT") || !matches!(rest.first(), Some(Token::LParen)) {
        return None;
    }
    let close = rest.iter().position(|t| *t == Token::RParen)?;
    let inner = &rest[1..close];
    let column = match inner {
        [Token::Star] => None,
        _ => {
            let (column, used) = column_ref(inner, scope)?;
            if used != inner.len() {
                return None;
            }
            Some(column)
        }
    };
    let name = alias(&rest[close + 1..])?;
    Some(Projection::Count {
        column,
        alias: name.unwrap_or_else(|| "count".to_string()),
    })
}

fn parse_order(tokens: &[Token], scope: &Scope) -> Vec<SortKey> {
    split_commas(tokens)
        .into_iter()
        .filter_map(|item| {
            let (column, used) = column_ref(item, scope)?;
            let mut descending = false;
            for token in &item[used..] {
                if token.is_keyword("DESC") {
                    descending = true;
                } else if !(token.is_keyword("ASC")
                    || token.is_keyword("NULLS")
                    || token.is_keyword("FIRST")
                    || token.is_keyword("LAST"))
                {
                    return None;
                }
            }
            Some(SortKey { column, descending })
        })
        .collect()
}

/// `LIMIT n`, `LIMIT ?` or `LIMIT offset, count`.
fn parse_limit(tokens: &[Token], cursor: &mut ParamCursor<'_>, plan: &mut QueryPlan) {
    match split_commas(tokens).as_slice() {
        [count] => {
            if let Some(limit) = parse_count(count, cursor) {
                plan.limit = Some(limit);
            }
        }
        [offset, count] => {
            let offset = parse_count(offset, cursor);
            let count = parse_count(count, cursor);
            if let (Some(offset), Some(count)) = (offset, count) {
                plan.offset = Some(offset);
                plan.limit = Some(count);
            }
        }
        _ => {}
    }
}

/// A non-negative count from a literal or placeholder. Negative values mean
/// "no limit" and read as `None`.
fn parse_count(tokens: &[Token], cursor: &mut ParamCursor<'_>) -> Option<usize> {
    let value = match tokens {
        [Token::Placeholder] => cursor.take(),
        [Token::Number(n)] => Value::Text(n.clone()),
        _ => return None,
    };
    value.as_i64().and_then(|n| usize::try_from(n).ok())
}

/// Parses a `WHERE` body into a filter, consuming its placeholders.
pub(crate) fn parse_filter(
    tokens: &[Token],
    cursor: &mut ParamCursor<'_>,
    scope: &Scope,
) -> Filter {
    let start = cursor.position();
    let mut parser = FilterParser {
        tokens,
        pos: 0,
        cursor,
        scope,
    };
    let filter = parser.parse_or();
    let consumed_all = parser.pos >= tokens.len();

    if consumed_all {
        filter
    } else {
        cursor.seek(start + count_placeholders(tokens));
        Filter::Unrecognized
    }
}

struct FilterParser<'t, 'c, 'p, 's> {
    tokens: &'t [Token],
    pos: usize,
    cursor: &'c mut ParamCursor<'p>,
    scope: &'s Scope,
}

impl FilterParser<'_, '_, '_, '_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn save(&self) -> (usize, usize) {
        (self.pos, self.cursor.position())
    }

    fn restore(&mut self, (pos, param): (usize, usize)) {
        self.pos = pos;
        self.cursor.seek(param);
    }

    fn at_boundary(&self) -> bool {
        match self.peek() {
            None | Some(Token::RParen) => true,
            Some(t) => t.is_keyword("AND") || t.is_keyword("OR"),
        }
    }

    fn parse_or(&mut self) -> Filter {
        let mut terms = vec![self.parse_and()];
        while self.eat_keyword("OR") {
            terms.push(self.parse_and());
        }
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::Or(terms)
        }
    }

    fn parse_and(&mut self) -> Filter {
        let mut terms = vec![self.parse_unary()];
        while self.eat_keyword("AND") {
            terms.push(self.parse_unary());
        }
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::And(terms)
        }
    }

    fn parse_unary(&mut self) -> Filter {
        if self.eat_keyword("NOT") {
            return Filter::Not(Box::new(self.parse_unary()));
        }

        if self.peek() == Some(&Token::LParen) {
            let saved = self.save();
            self.pos += 1;
            let inner = self.parse_or();
            if self.eat(&Token::RParen) && self.at_boundary() {
                return inner;
            }
            self.restore(saved);
            return self.skip_atom();
        }

        let saved = self.save();
        match self.parse_atom() {
            Some(filter) if self.at_boundary() => filter,
            _ => {
                self.restore(saved);
                self.skip_atom()
            }
        }
    }

    fn parse_atom(&mut self) -> Option<Filter> {
        let (column, used) = column_ref(&self.tokens[self.pos..], self.scope)?;
        self.pos += used;

        let negated = self.eat_keyword("NOT");

        if !negated && self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            return self
                .eat_keyword("NULL")
                .then_some(Filter::IsNull { column, negated });
        }

        if self.eat_keyword("LIKE") || self.eat_keyword("ILIKE") {
            let pattern = self.operand()?;
            return Some(Filter::Like {
                column,
                pattern: pattern.as_text().into_owned(),
                negated,
            });
        }

        if self.eat_keyword("IN") {
            if !self.eat(&Token::LParen) {
                return None;
            }
            let mut values = vec![self.operand()?];
            while self.eat(&Token::Comma) {
                values.push(self.operand()?);
            }
            if !self.eat(&Token::RParen) {
                return None;
            }
            return Some(Filter::In {
                column,
                values,
                negated,
            });
        }

        if self.eat_keyword("BETWEEN") {
            let low = self.operand()?;
            if !self.eat_keyword("AND") {
                return None;
            }
            let high = self.operand()?;
            return Some(Filter::Between {
                column,
                low,
                high,
                negated,
            });
        }

        if negated {
            return None;
        }

        let op = match self.peek() {
            Some(Token::Op(symbol)) => CompareOp::from_symbol(symbol)?,
            _ => return None,
        };
        self.pos += 1;
        let value = self.operand()?;
        Some(Filter::Compare { column, op, value })
    }

    /// A placeholder or literal operand.
    fn operand(&mut self) -> Option<Value> {
        let value = match self.peek()?.clone() {
            Token::Placeholder => {
                self.pos += 1;
                return Some(self.cursor.take());
            }
            Token::Str(s) => Value::Text(s),
            Token::Number(n) => number(&n)?,
            Token::Op(op) if op == "-" => {
                let Some(Token::Number(n)) = self.tokens.get(self.pos + 1) else {
                    return None;
                };
                let magnitude = number(n)?;
                self.pos += 1;
                match magnitude {
                    Value::Integer(v) => Value::Integer(-v),
                    Value::Real(v) => Value::Real(-v),
                    other => other,
                }
            }
            t if t.is_keyword("NULL") => Value::Null,
            t if t.is_keyword("TRUE") => Value::Integer(1),
            t if t.is_keyword("FALSE") => Value::Integer(0),
            _ => return None,
        };
        self.pos += 1;
        Some(value)
    }

    /// Skips an atom the parser does not understand, up to the next
    /// top-level `AND`/`OR` or closing parenthesis, consuming its
    /// placeholders.
    fn skip_atom(&mut self) -> Filter {
        let mut depth = 0usize;
        let mut pending_between = false;
        let start = self.pos;

        while let Some(token) = self.peek() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen if depth == 0 => break,
                Token::RParen => depth -= 1,
                t if depth == 0 && t.is_keyword("BETWEEN") => pending_between = true,
                t if depth == 0 && t.is_keyword("AND") && pending_between => {
                    pending_between = false
                }
                t if depth == 0 && (t.is_keyword("AND") || t.is_keyword("OR")) => break,
                _ => {}
            }
            self.pos += 1;
        }

        // An atom must consume at least one token, or an unmatched `)` at
        // the top level would loop forever.
        if self.pos == start && self.pos < self.tokens.len() {
            self.pos += 1;
        }

        let skipped = count_placeholders(&self.tokens[start..self.pos]);
        self.cursor.seek(self.cursor.position() + skipped);
        Filter::Unrecognized
    }
}

fn number(text: &str) -> Option<Value> {
    if let Ok(v) = text.parse::<i64>() {
        return Some(Value::Integer(v));
    }
    text.parse::<f64>().ok().map(Value::Real)
}
