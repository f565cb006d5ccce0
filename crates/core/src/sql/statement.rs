//! Statement classification and target-table extraction.

use super::lexer::{tokenize, Token};

/// Broad kind of a statement, decided by its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    pub fn of(sql: &str) -> Self {
        Self::from_tokens(&tokenize(sql))
    }

    pub fn from_tokens(tokens: &[Token]) -> Self {
        match tokens.first() {
            Some(t) if t.is_keyword("SELECT") || t.is_keyword("WITH") => StatementKind::Select,
            Some(t) if t.is_keyword("INSERT") || t.is_keyword("REPLACE") => StatementKind::Insert,
            Some(t) if t.is_keyword("UPDATE") => StatementKind::Update,
            Some(t) if t.is_keyword("DELETE") => StatementKind::Delete,
            _ => StatementKind::Other,
        }
    }

    /// Insert, update or delete.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        )
    }
}

/// Finds the table a statement reads from or writes to, lowercased.
///
/// Looks for the first name following `FROM`, `INTO` or `UPDATE`, skipping
/// past subqueries. Schema qualifiers are dropped.
pub fn extract_table(sql: &str) -> Option<String> {
    extract_table_from_tokens(&tokenize(sql))
}

pub fn extract_table_from_tokens(tokens: &[Token]) -> Option<String> {
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        let is_target = token.is_keyword("FROM")
            || token.is_keyword("INTO")
            || (token.is_keyword("UPDATE") && !preceded_by_do(tokens, i));

        if is_target {
            let mut j = i + 1;
            if token.is_keyword("UPDATE") {
                // UPDATE OR REPLACE t
                if tokens.get(j).is_some_and(|t| t.is_keyword("OR")) {
                    j += 2;
                }
            }
            if let Some(name) = tokens.get(j).and_then(Token::ident) {
                let name = match (tokens.get(j + 1), tokens.get(j + 2).and_then(Token::ident)) {
                    (Some(Token::Dot), Some(qualified)) => qualified,
                    _ => name,
                };
                return Some(name.to_ascii_lowercase());
            }
        }
        i += 1;
    }
    None
}

/// `ON CONFLICT ... DO UPDATE` is not an update target.
fn preceded_by_do(tokens: &[Token], i: usize) -> bool {
    i > 0 && tokens[i - 1].is_keyword("DO")
}
