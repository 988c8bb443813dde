// SPDX-License-Identifier: MIT OR Apache-2.0

//! The optional data-session: a pooled connection to the user-owned data
//! store that `select`-kind artifacts execute against. Unlike the metadata
//! store (`Database`), its schema is opaque to the core — it is reached
//! through `sqlx::Any` so the same executor code works regardless of which
//! SQL dialect the deployment points it at.

use crate::errors::{AppError, AppResult, ErrorCode};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::collections::HashMap;

#[derive(Clone)]
pub struct DataSession {
    pool: sqlx::AnyPool,
    dialect: Dialect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    Other,
}

impl DataSession {
    pub async fn connect(url: &str) -> AppResult<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await
            .map_err(|e| AppError::new(ErrorCode::DataBackendUnavailable, e.to_string()))?;
        let dialect = if url.starts_with("sqlite:") {
            Dialect::Sqlite
        } else if url.starts_with("postgres") {
            Dialect::Postgres
        } else {
            Dialect::Other
        };
        Ok(Self { pool, dialect })
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Run a lightweight liveness check; used by `test_db_connection`.
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::new(ErrorCode::DataBackendUnavailable, e.to_string()))?;
        Ok(())
    }

    /// Execute a rendered, validated, single `SELECT` statement, binding each
    /// `:name` placeholder present in `params` by name and normalizing rows
    /// into `column -> value` maps.
    pub async fn query(
        &self,
        rendered_sql: &str,
        params: &HashMap<String, serde_json::Value>,
    ) -> AppResult<Vec<serde_json::Map<String, serde_json::Value>>> {
        let (positional_sql, ordered_values) = bind_named_placeholders(rendered_sql, params)?;

        let mut query = sqlx::query(&positional_sql);
        for value in &ordered_values {
            query = bind_json_value(query, value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::new(ErrorCode::DatabaseError, e.to_string()))?;

        rows.iter().map(row_to_map).collect()
    }

    /// Execute a write statement produced by a write-capable meta-tool
    /// (`general_merge_tool`, `execute_ddl_tool`).
    pub async fn execute(&self, statement: &str) -> AppResult<u64> {
        let result = sqlx::query(statement)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::new(ErrorCode::DatabaseError, e.to_string()))?;
        Ok(result.rows_affected())
    }
}

/// Rewrite `:name` placeholders into positional `?`/`$n` form (sqlx::Any
/// uses `?` uniformly) and return the values to bind, in order.
fn bind_named_placeholders(
    sql: &str,
    params: &HashMap<String, serde_json::Value>,
) -> AppResult<(String, Vec<serde_json::Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ':' && chars.get(i + 1).is_some_and(|c| c.is_alphabetic() || *c == '_') {
            let mut j = i + 1;
            while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            let name: String = chars[i + 1..j].iter().collect();
            let value = params.get(&name).cloned().ok_or_else(|| {
                AppError::new(
                    ErrorCode::MissingArgument,
                    format!("missing bound parameter ':{name}'"),
                )
            })?;
            values.push(value);
            out.push('?');
            i = j;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    Ok((out, values))
}

fn bind_json_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    value: &serde_json::Value,
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    match value {
        serde_json::Value::Null => query.bind(None::<String>),
        serde_json::Value::Bool(b) => query.bind(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn row_to_map(row: &AnyRow) -> AppResult<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name().to_owned();
        let value = any_value_to_json(row, idx, column.type_info().name())?;
        map.insert(name, value);
    }
    Ok(map)
}

fn any_value_to_json(row: &AnyRow, idx: usize, type_name: &str) -> AppResult<serde_json::Value> {
    let raw = row.try_get_raw(idx).map_err(|e| AppError::new(ErrorCode::DatabaseError, e.to_string()))?;
    if raw.is_null() {
        return Ok(serde_json::Value::Null);
    }
    // Best-effort typed decode with a text fallback; the data store's schema
    // is opaque to the core so a perfect type mapping isn't attempted.
    if type_name.contains("INT") {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(serde_json::json!(v));
        }
    }
    if type_name.contains("FLOAT") || type_name.contains("DOUBLE") || type_name.contains("REAL") {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Ok(serde_json::json!(v));
        }
    }
    if type_name.contains("BOOL") {
        if let Ok(v) = row.try_get::<bool, _>(idx) {
            return Ok(serde_json::json!(v));
        }
    }
    row.try_get::<String, _>(idx)
        .map(serde_json::Value::String)
        .map_err(|e| AppError::new(ErrorCode::DatabaseError, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_named_placeholders_in_order() {
        let mut params = HashMap::new();
        params.insert("store".to_owned(), serde_json::json!("A"));
        let (sql, values) =
            bind_named_placeholders("SELECT * FROM sales WHERE store = :store", &params).unwrap();
        assert_eq!(sql, "SELECT * FROM sales WHERE store = ?");
        assert_eq!(values, vec![serde_json::json!("A")]);
    }

    #[test]
    fn missing_bound_parameter_errors() {
        let params = HashMap::new();
        let err = bind_named_placeholders("SELECT * FROM t WHERE x = :x", &params).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingArgument);
    }
}
