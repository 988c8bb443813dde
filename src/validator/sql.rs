// SPDX-License-Identifier: MIT OR Apache-2.0

//! C3 — Validator: read-only/single-statement checks on SQL artifacts.
//!
//! No SQL-parsing crate is depended on anywhere in the codebase this project
//! is built on top of, so this validator is a small hand-rolled tokenizer:
//! comment stripping, a single-statement check, and a forbidden-keyword scan
//! over the first significant token and the remainder of the statement.

use crate::errors::EngineError;

const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE", "EXEC",
    "EXECUTE", "MERGE", "REPLACE", "CALL", "ATTACH", "DETACH", "PRAGMA", "VACUUM", "REINDEX",
];

const DDL_KEYWORDS: &[&str] = &["CREATE", "ALTER", "DROP", "TRUNCATE"];

/// Remove `--` line comments and `/* ... */` block comments from `sql`,
/// respecting single-quoted string literals so a comment marker inside a
/// string is not treated as a real comment.
#[must_use]
pub fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;
    let mut in_string = false;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\'' {
                // Handle escaped '' inside a string literal.
                if chars.get(i + 1) == Some(&'\'') {
                    out.push('\'');
                    i += 2;
                    continue;
                }
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
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
                i += 2; // skip closing */
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Split a comment-stripped statement into `;`-terminated clauses, ignoring
/// semicolons inside string literals. A single trailing terminator (with
/// only whitespace after it) is tolerated and does not count as a second
/// clause.
fn significant_clauses(stripped: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let bytes: Vec<char> = stripped.chars().collect();
    for (idx, &c) in bytes.iter().enumerate() {
        match c {
            '\'' => in_string = !in_string,
            ';' if !in_string => {
                let clause: String = bytes[start..idx].iter().collect::<String>().trim().to_owned();
                if !clause.is_empty() {
                    clauses.push(clause);
                }
                start = idx + 1;
            }
            _ => {}
        }
    }
    let tail: String = bytes[start..].iter().collect::<String>().trim().to_owned();
    if !tail.is_empty() {
        clauses.push(tail);
    }
    clauses
}

fn first_token(clause: &str) -> Option<String> {
    clause
        .split_whitespace()
        .next()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_uppercase())
}

fn contains_forbidden_keyword(clause: &str, forbidden: &[&str]) -> Option<String> {
    for raw_token in clause.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let token = raw_token.to_uppercase();
        if forbidden.contains(&token.as_str()) {
            return Some(token);
        }
    }
    None
}

/// `validate_sql(rendered)` (`spec.md §4.3`): the rendered body must be a
/// single read-only statement.
pub fn validate_sql(rendered: &str) -> Result<(), EngineError> {
    let stripped = strip_comments(rendered);
    let clauses = significant_clauses(&stripped);

    if clauses.len() > 1 {
        return Err(EngineError::MultipleStatements);
    }
    let Some(clause) = clauses.first() else {
        return Err(EngineError::MultipleStatements);
    };

    let first = first_token(clause).unwrap_or_default();
    let is_read = first == "SELECT" || first == "WITH";
    if !is_read {
        return Err(EngineError::NotReadOnly {
            keyword: first,
        });
    }

    if let Some(keyword) = contains_forbidden_keyword(clause, WRITE_KEYWORDS) {
        return Err(EngineError::NotReadOnly { keyword });
    }

    Ok(())
}

/// `validate_ddl(body)`: inverts the read-only rule for the DDL meta-tool —
/// the first token must be a DDL verb, single-statement rule still holds.
pub fn validate_ddl(body: &str) -> Result<(), EngineError> {
    let stripped = strip_comments(body);
    let clauses = significant_clauses(&stripped);

    if clauses.len() > 1 {
        return Err(EngineError::MultipleStatements);
    }
    let Some(clause) = clauses.first() else {
        return Err(EngineError::MultipleStatements);
    };

    let first = first_token(clause).unwrap_or_default();
    if !DDL_KEYWORDS.contains(&first.as_str()) {
        return Err(EngineError::NotReadOnly { keyword: first });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_select() {
        assert!(validate_sql("SELECT store, SUM(amount) FROM sales WHERE store = :store").is_ok());
    }

    #[test]
    fn accepts_with_select() {
        assert!(validate_sql("WITH t AS (SELECT 1 AS x) SELECT * FROM t").is_ok());
    }

    #[test]
    fn rejects_delete() {
        let err = validate_sql("DELETE FROM sales").unwrap_err();
        assert!(matches!(err, EngineError::NotReadOnly { .. }));
    }

    #[test]
    fn rejects_write_keyword_hidden_after_select() {
        let err = validate_sql("SELECT 1; DELETE FROM sales").unwrap_err();
        assert!(matches!(err, EngineError::MultipleStatements));
    }

    #[test]
    fn tolerates_single_trailing_semicolon() {
        assert!(validate_sql("SELECT 1;").is_ok());
    }

    #[test]
    fn strips_comments_before_checking() {
        assert!(validate_sql("-- comment\nSELECT 1 /* inline */ FROM sales").is_ok());
    }

    #[test]
    fn comment_hides_forbidden_keyword_and_statement_is_accepted() {
        assert!(validate_sql("SELECT 1 FROM t -- DROP TABLE t").is_ok());
    }

    #[test]
    fn validate_ddl_accepts_create() {
        assert!(validate_ddl("CREATE TABLE t (id INTEGER)").is_ok());
    }

    #[test]
    fn validate_ddl_rejects_select() {
        assert!(validate_ddl("SELECT 1").is_err());
    }
}
