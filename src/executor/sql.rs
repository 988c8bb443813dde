// SPDX-License-Identifier: MIT OR Apache-2.0

//! C6 — SQL Executor: renders a `select`-kind artifact against the macro
//! prelude and the caller's arguments, validates it is read-only and
//! single-statement, then runs it against the opaque data session.

use crate::database::DataSession;
use crate::errors::EngineError;
use crate::registry::models::MacroRecord;
use crate::template::render_sql;
use crate::validator::validate_sql;
use std::collections::HashMap;

/// Temporary ("test") SQL tools are capped to a small fixed row limit
/// (`spec.md §4.6`): any trailing row-limit clause in the rendered
/// statement is stripped and a fixed `LIMIT n` is appended instead.
fn apply_temp_row_limit(rendered: &str, limit: i64) -> String {
    let trimmed = rendered.trim().trim_end_matches(';').trim_end();
    let stripped = strip_trailing_limit_clause(trimmed);
    format!("{stripped} LIMIT {limit}")
}

fn strip_trailing_limit_clause(sql: &str) -> &str {
    let upper = sql.to_uppercase();
    if let Some(idx) = upper.rfind("LIMIT") {
        // Only strip if LIMIT is genuinely a trailing clause, i.e. nothing
        // but digits/whitespace/OFFSET follows it.
        let tail = upper[idx + "LIMIT".len()..].trim();
        let looks_like_limit_clause = tail
            .split_whitespace()
            .all(|tok| tok.chars().all(|c| c.is_ascii_digit()) || tok == "OFFSET");
        if looks_like_limit_clause {
            return sql[..idx].trim_end();
        }
    }
    sql
}

/// Execute a rendered, validated `SELECT` against the data session,
/// returning rows as `column -> value` maps (`spec.md §4.7`, C6 contract).
///
/// `row_limit` is `Some(n)` for temporary ("test") tool variants and `None`
/// for persisted tools, per `spec.md §4.6`.
pub async fn execute_sql_tool(
    artifact_body: &str,
    arguments: &serde_json::Value,
    active_macros: &[MacroRecord],
    data_session: Option<&DataSession>,
    row_limit: Option<i64>,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, EngineError> {
    let rendered = render_sql(artifact_body, arguments, active_macros)?;
    validate_sql(&rendered)?;

    let Some(session) = data_session else {
        return Err(EngineError::DataBackendUnavailable);
    };

    let final_sql = match row_limit {
        Some(limit) => apply_temp_row_limit(&rendered, limit),
        None => rendered,
    };

    let params = arguments_to_param_map(arguments);
    session
        .query(&final_sql, &params)
        .await
        .map_err(|e| EngineError::Database(e.message))
}

fn arguments_to_param_map(arguments: &serde_json::Value) -> HashMap<String, serde_json::Value> {
    arguments
        .as_object()
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_limit_and_appends_fixed_limit() {
        let rendered = "SELECT * FROM sales LIMIT 500";
        assert_eq!(apply_temp_row_limit(rendered, 3), "SELECT * FROM sales LIMIT 3");
    }

    #[test]
    fn leaves_statement_without_limit_unchanged_besides_append() {
        let rendered = "SELECT * FROM sales WHERE store = :store";
        assert_eq!(
            apply_temp_row_limit(rendered, 3),
            "SELECT * FROM sales WHERE store = :store LIMIT 3"
        );
    }

    #[test]
    fn does_not_strip_limit_used_as_a_column_alias_lookalike() {
        // "LIMIT" appearing mid-statement followed by non-numeric tokens is
        // not treated as a row-limit clause.
        let rendered = "SELECT * FROM sales WHERE note = 'no limit here'";
        let result = apply_temp_row_limit(rendered, 3);
        assert!(result.ends_with("LIMIT 3"));
    }
}
