//! A small lexer for the SQL dialect shared by both engines.
//!
//! It only needs to be good enough to find clause boundaries, column
//! references, literals and placeholders. Comments are dropped.

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare identifier or keyword, as written.
    Word(String),
    /// `"identifier"` or `` `identifier` ``, unquoted.
    Quoted(String),
    /// `'literal'` with doubled quotes collapsed.
    Str(String),
    Number(String),
    /// Positional `?` marker.
    Placeholder,
    /// Comparison or arithmetic operator.
    Op(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Star,
    Semicolon,
}

impl Token {
    /// Case-insensitive keyword check.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    /// Identifier text for bare or quoted names.
    pub fn ident(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::Quoted(w) => Some(w),
            _ => None,
        }
    }
}

/// Splits `sql` into tokens.
pub fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            '\'' => {
                let (text, next) = read_quoted(&chars, i, '\'');
                tokens.push(Token::Str(text));
                i = next;
            }
            '"' | '`' => {
                let (text, next) = read_quoted(&chars, i, c);
                tokens.push(Token::Quoted(text));
                i = next;
            }
            '?' => {
                tokens.push(Token::Placeholder);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '.' if !chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            _ => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let op = match two.as_str() {
                    "<=" | ">=" | "<>" | "!=" | "==" | "||" | "::" => two,
                    _ => c.to_string(),
                };
                i += op.chars().count();
                tokens.push(Token::Op(op));
            }
        }
    }

    tokens
}

/// Reads a quoted run starting at `start`. A doubled quote is an escaped one.
fn read_quoted(chars: &[char], start: usize, quote: char) -> (String, usize) {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                text.push(quote);
                i += 2;
                continue;
            }
            return (text, i + 1);
        }
        text.push(chars[i]);
        i += 1;
    }
    (text, i)
}

/// Number of `?` placeholders among `tokens`.
pub fn count_placeholders(tokens: &[Token]) -> usize {
    tokens.iter().filter(|t| **t == Token::Placeholder).count()
}
