// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool-manual maintenance and self-verification meta-tools
//! (`spec.md §4.8`).

use crate::database::DatabaseProvider;
use crate::dispatcher::Dispatcher;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::registry::models::{ManualExample, ToolManual, ToolState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualUpdateMode {
    Merge,
    Replace,
}

/// `system_update_manual(tool_name, persona, mode, patch)` (`spec.md §4.8`):
/// merging appends to arrays and keeps prior verified examples intact;
/// replacing discards the existing manual outright. Newly added examples
/// always start unverified — only `system_verify_tool` can set `verified`.
pub async fn system_update_manual(
    dispatcher: &Dispatcher,
    tool_name: &str,
    persona: &str,
    mode: ManualUpdateMode,
    patch: ToolManual,
) -> AppResult<ToolManual> {
    let mut record = dispatcher
        .meta_session()
        .get_tool(tool_name, persona)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ToolNotFound, format!("no tool '{tool_name}' for persona '{persona}'")))?;

    let merged = match mode {
        ManualUpdateMode::Replace => ToolManual {
            usage_guide: patch.usage_guide,
            examples: patch.examples.into_iter().map(unverified).collect(),
            pitfalls: patch.pitfalls,
            error_codes: patch.error_codes,
        },
        ManualUpdateMode::Merge => {
            let mut base = record.manual.clone().unwrap_or_default();
            if patch.usage_guide.is_some() {
                base.usage_guide = patch.usage_guide;
            }
            base.examples.extend(patch.examples.into_iter().map(unverified));
            base.pitfalls.extend(patch.pitfalls);
            base.error_codes.extend(patch.error_codes);
            base
        }
    };

    record.manual = Some(merged.clone());
    dispatcher.meta_session().upsert_tool(&record).await?;
    Ok(merged)
}

fn unverified(example: ManualExample) -> ManualExample {
    ManualExample { verified: false, ..example }
}

/// `system_inspect_tool(tool_name, persona)`: read-only view of a tool's
/// manual and artifact digest, for an agent deciding how to call it.
pub async fn system_inspect_tool(dispatcher: &Dispatcher, tool_name: &str, persona: &str) -> AppResult<serde_json::Value> {
    let record = dispatcher
        .meta_session()
        .get_tool(tool_name, persona)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ToolNotFound, format!("no tool '{tool_name}' for persona '{persona}'")))?;

    Ok(serde_json::json!({
        "name": record.name,
        "description": record.description,
        "input_schema": record.input_schema,
        "state": record.state,
        "is_auto_created": record.is_auto_created,
        "manual": record.manual,
    }))
}

/// `system_verify_tool(tool_name, persona)` (`spec.md §4.8`): runs every
/// manual example through the Dispatcher and marks it `verified` if its
/// rendered result matches `expected_summary`.
pub async fn system_verify_tool(dispatcher: &std::sync::Arc<Dispatcher>, tool_name: &str, persona: &str) -> AppResult<ToolManual> {
    let mut record = dispatcher
        .meta_session()
        .get_tool(tool_name, persona)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ToolNotFound, format!("no tool '{tool_name}' for persona '{persona}'")))?;

    let mut manual = record.manual.clone().unwrap_or_default();
    for example in &mut manual.examples {
        let outcome = dispatcher.call_tool(tool_name, persona, example.input.clone()).await;
        example.verified = match outcome {
            Ok(result) => render(&result) == example.expected_summary,
            Err(_) => false,
        };
    }

    record.state = next_verify_state(&manual.examples, record.state);

    record.manual = Some(manual.clone());
    dispatcher.meta_session().upsert_tool(&record).await?;
    Ok(manual)
}

/// `CREATED -> VERIFIED` when every example just verified (`spec.md §4.8`
/// state machine); a previously-`Verified` tool whose examples no longer all
/// pass falls back to `Created` rather than leaving a stale `Verified`
/// behind. A manual with no examples can never verify.
fn next_verify_state(examples: &[ManualExample], current: ToolState) -> ToolState {
    let all_verified = !examples.is_empty() && examples.iter().all(|e| e.verified);
    if all_verified {
        ToolState::Verified
    } else if current == ToolState::Verified {
        ToolState::Created
    } else {
        current
    }
}

fn render(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unverified_clears_the_flag() {
        let example = ManualExample { input: serde_json::json!({}), expected_summary: "ok".into(), verified: true };
        assert!(!unverified(example).verified);
    }

    fn example(verified: bool) -> ManualExample {
        ManualExample { input: serde_json::json!({}), expected_summary: "ok".into(), verified }
    }

    #[test]
    fn all_examples_passing_advances_to_verified() {
        let examples = vec![example(true), example(true)];
        assert_eq!(next_verify_state(&examples, ToolState::Created), ToolState::Verified);
    }

    #[test]
    fn a_failing_example_keeps_created_as_created() {
        let examples = vec![example(true), example(false)];
        assert_eq!(next_verify_state(&examples, ToolState::Created), ToolState::Created);
    }

    #[test]
    fn a_failing_example_drops_verified_back_to_created() {
        let examples = vec![example(true), example(false)];
        assert_eq!(next_verify_state(&examples, ToolState::Verified), ToolState::Created);
    }

    #[test]
    fn no_examples_never_verifies() {
        assert_eq!(next_verify_state(&[], ToolState::Created), ToolState::Created);
    }
}
