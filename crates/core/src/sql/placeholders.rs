//! Positional placeholder translation.

/// Rewrites `?` markers into PostgreSQL's numbered `$1, $2, ...` form.
///
/// Markers inside string literals, quoted identifiers and comments are left
/// untouched.
pub fn to_numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut index = 0;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(c);
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(c);
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    out.push(inner);
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            '?' => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_placeholders_in_order() {
        assert_eq!(
            to_numbered_placeholders(
                "UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?"
            ),
            "UPDATE appointments SET status = $1, updated_at = $2 WHERE id = $3"
        );
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let sql = "SELECT * FROM staff";
        assert_eq!(to_numbered_placeholders(sql), sql);
    }

    #[test]
    fn test_skips_literals_and_identifiers() {
        assert_eq!(
            to_numbered_placeholders(r#"SELECT "what?" FROM faq WHERE q = 'why?' AND id = ?"#),
            r#"SELECT "what?" FROM faq WHERE q = 'why?' AND id = $1"#
        );
    }

    #[test]
    fn test_escaped_quote_inside_literal() {
        assert_eq!(
            to_numbered_placeholders("SELECT * FROM t WHERE a = 'it''s ?' AND b = ?"),
            "SELECT * FROM t WHERE a = 'it''s ?' AND b = $1"
        );
    }

    #[test]
    fn test_skips_comments() {
        assert_eq!(
            to_numbered_placeholders("SELECT * FROM t -- any?\nWHERE a = ? /* b = ? */"),
            "SELECT * FROM t -- any?\nWHERE a = $1 /* b = ? */"
        );
    }

    #[test]
    fn test_double_digit_indices() {
        let sql = vec!["?"; 11].join(", ");
        let translated = to_numbered_placeholders(&sql);
        assert!(translated.ends_with("$10, $11"));
    }
}
