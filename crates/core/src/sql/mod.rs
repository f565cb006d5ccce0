//! Lightweight SQL text handling: tokens, placeholders, statement targets.
//!
//! None of this is a SQL parser. It recognizes just enough structure to
//! route statements and feed the query interpreter.

mod lexer;
mod placeholders;
mod statement;

pub use lexer::{count_placeholders, tokenize, Token};
pub use placeholders::to_numbered_placeholders;
pub use statement::{extract_table, extract_table_from_tokens, StatementKind};
