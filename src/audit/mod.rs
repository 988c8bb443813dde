// SPDX-License-Identifier: MIT OR Apache-2.0

//! C9 — Audit: an entry is written for every dispatched call, success or
//! failure (`spec.md` P2), and a `self_correction` notebook append records
//! the failure for later retrieval by `get_last_error`.

pub mod notebook;

use crate::constants::{RESULT_SUMMARY_MAX_CHARS, SELF_CORRECTION_DOMAIN};
use crate::database::{DatabaseProvider, ExecutionLogInput};
use crate::errors::AppResult;
use crate::registry::models::ExecutionStatus;

/// Write a `SUCCESS` entry with a bounded summary of `result`.
pub async fn record_success(
    db: &impl DatabaseProvider,
    tool_name: &str,
    persona: &str,
    arguments: &serde_json::Value,
    result: &serde_json::Value,
) -> AppResult<()> {
    let summary = bounded_summary(result);
    db.insert_execution_log(ExecutionLogInput {
        tool_name: tool_name.to_owned(),
        persona: persona.to_owned(),
        arguments: arguments.clone(),
        status: ExecutionStatus::Success,
        result_summary: summary,
        error_traceback: None,
    })
    .await
}

/// Write a `FAILURE` entry with the full diagnostic, then append a
/// `self_correction` notebook entry summarizing the failure
/// (`spec.md §4.5` step 6).
pub async fn record_failure(
    db: &impl DatabaseProvider,
    tool_name: &str,
    persona: &str,
    arguments: &serde_json::Value,
    traceback: &str,
) -> AppResult<()> {
    db.insert_execution_log(ExecutionLogInput {
        tool_name: tool_name.to_owned(),
        persona: persona.to_owned(),
        arguments: arguments.clone(),
        status: ExecutionStatus::Failure,
        result_summary: bounded_summary(&serde_json::json!({"error": traceback})),
        error_traceback: Some(traceback.to_owned()),
    })
    .await?;

    let key = format!("{persona}:{tool_name}");
    let value = format!("{tool_name} failed for persona '{persona}': {traceback}");
    notebook::append(db, SELF_CORRECTION_DOMAIN, &key, &value, "system").await
}

/// Bound a JSON value's textual rendering to `RESULT_SUMMARY_MAX_CHARS`
/// (`spec.md §3` ExecutionLog: "bounded length").
fn bounded_summary(value: &serde_json::Value) -> String {
    let text = value.to_string();
    if text.chars().count() <= RESULT_SUMMARY_MAX_CHARS {
        text
    } else {
        let truncated: String = text.chars().take(RESULT_SUMMARY_MAX_CHARS).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_summary_truncates_long_text() {
        let long = "x".repeat(RESULT_SUMMARY_MAX_CHARS + 50);
        let summary = bounded_summary(&serde_json::json!(long));
        assert!(summary.chars().count() <= RESULT_SUMMARY_MAX_CHARS + 1);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn bounded_summary_leaves_short_text_untouched() {
        let summary = bounded_summary(&serde_json::json!("short"));
        assert_eq!(summary, "\"short\"");
    }
}
