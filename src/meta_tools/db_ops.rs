// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data-session lifecycle and write-capable SQL meta-tools
//! (`spec.md §4.8`).

use crate::database::data_session::Dialect;
use crate::database::DatabaseProvider;
use crate::dispatcher::Dispatcher;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::validator::validate_ddl;

/// `get_last_error(tool_name)`: formats the most recent `FAILURE`
/// ExecutionLog, scoped to `tool_name` when given.
pub async fn get_last_error(dispatcher: &Dispatcher, tool_name: Option<&str>) -> AppResult<String> {
    let entry = dispatcher.meta_session().get_last_failure(tool_name).await?;
    Ok(match entry {
        Some(log) => format!(
            "[{}] {} (persona={}) failed at {}: {}",
            log.id,
            log.tool_name,
            log.persona,
            log.timestamp,
            log.error_traceback.as_deref().unwrap_or(&log.result_summary),
        ),
        None => "no failures recorded".to_owned(),
    })
}

/// `reconnect_db(url)`: swaps the live data session for a freshly connected
/// one, leaving the previous session in place if the new one fails to ping.
pub async fn reconnect_db(dispatcher: &Dispatcher, url: &str) -> AppResult<()> {
    dispatcher.reconnect_data_session(url).await
}

/// `test_db_connection()`: a liveness check against whatever data session
/// is currently attached, without mutating it.
pub async fn test_db_connection(dispatcher: &Dispatcher) -> AppResult<bool> {
    match dispatcher.data_session().await {
        Some(session) => match session.ping().await {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        },
        None => Err(AppError::new(ErrorCode::DataBackendUnavailable, "no data session is attached")),
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_owned(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// `general_merge_tool(table, key_columns, row)` (`spec.md §4.8`): builds
/// and runs a dialect-appropriate upsert against the attached data session.
pub async fn general_merge_tool(
    dispatcher: &Dispatcher,
    table: &str,
    key_columns: &[String],
    row: &serde_json::Value,
) -> AppResult<u64> {
    let columns = row
        .as_object()
        .ok_or_else(|| AppError::new(ErrorCode::InvalidInput, "row must be an object"))?;
    if columns.is_empty() {
        return Err(AppError::new(ErrorCode::InvalidInput, "row must have at least one column"));
    }

    let session = dispatcher
        .data_session()
        .await
        .ok_or_else(|| AppError::new(ErrorCode::DataBackendUnavailable, "no data session is attached"))?;

    let col_names: Vec<&String> = columns.keys().collect();
    let values: Vec<String> = col_names.iter().map(|c| quote_literal(&columns[*c])).collect();
    let col_list = col_names.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let val_list = values.join(", ");

    let statement = match session.dialect() {
        Dialect::Sqlite => {
            format!("REPLACE INTO {} ({col_list}) VALUES ({val_list})", quote_ident(table))
        }
        Dialect::Postgres => {
            let update_cols: Vec<&String> = col_names.iter().copied().filter(|c| !key_columns.contains(c)).collect();
            let conflict = key_columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
            if update_cols.is_empty() {
                format!(
                    "INSERT INTO {} ({col_list}) VALUES ({val_list}) ON CONFLICT ({conflict}) DO NOTHING",
                    quote_ident(table)
                )
            } else {
                let assignments = update_cols
                    .iter()
                    .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "INSERT INTO {} ({col_list}) VALUES ({val_list}) ON CONFLICT ({conflict}) DO UPDATE SET {assignments}",
                    quote_ident(table)
                )
            }
        }
        Dialect::Other => {
            let on = key_columns
                .iter()
                .map(|c| format!("target.{} = source.{}", quote_ident(c), quote_ident(c)))
                .collect::<Vec<_>>()
                .join(" AND ");
            let assignments = col_names
                .iter()
                .map(|c| format!("{} = source.{}", quote_ident(c), quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "MERGE INTO {} AS target USING (SELECT {val_list}) AS source ({col_list}) ON {on} \
                 WHEN MATCHED THEN UPDATE SET {assignments} \
                 WHEN NOT MATCHED THEN INSERT ({col_list}) VALUES ({val_list})",
                quote_ident(table)
            )
        }
    };

    session.execute(&statement).await
}

/// `execute_ddl_tool(statement, confirm)` (`spec.md §4.8`): requires the
/// literal confirmation token `"YES"` before any DDL is allowed to run.
pub async fn execute_ddl_tool(dispatcher: &Dispatcher, statement: &str, confirm: &str) -> AppResult<u64> {
    if confirm != "YES" {
        return Err(AppError::new(ErrorCode::InvalidInput, "DDL execution requires confirm=\"YES\""));
    }
    validate_ddl(statement)?;

    let session = dispatcher
        .data_session()
        .await
        .ok_or_else(|| AppError::new(ErrorCode::DataBackendUnavailable, "no data session is attached"))?;
    session.execute(statement).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_escapes_double_quotes() {
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn quote_literal_escapes_single_quotes() {
        assert_eq!(quote_literal(&serde_json::json!("O'Brien")), "'O''Brien'");
    }
}
