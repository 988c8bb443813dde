// SPDX-License-Identifier: MIT OR Apache-2.0

//! C10 — Chain Engine: DAG validation and sequential execution of a
//! client-supplied plan, composing Dispatcher (C5) calls by strict index
//! order with `${id}`/`${id.path}` substitution between steps.

use crate::errors::EngineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Step {
    pub id: String,
    pub tool: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub id: String,
    pub tool: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainFailure {
    pub step_index: usize,
    pub step_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub completed: Vec<StepOutcome>,
    pub results: Option<HashMap<String, serde_json::Value>>,
    pub failure: Option<ChainFailure>,
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_]+)(\.[A-Za-z0-9_.]+)?\}").expect("static pattern"))
}

/// Extract every `${id}`/`${id.path}` reference appearing anywhere inside a
/// JSON value (recursing through objects and arrays, matching inside strings).
fn extract_references(value: &serde_json::Value, out: &mut Vec<(String, Option<String>)>) {
    match value {
        serde_json::Value::String(s) => {
            for cap in reference_pattern().captures_iter(s) {
                let id = cap[1].to_owned();
                let path = cap.get(2).map(|m| m.as_str().trim_start_matches('.').to_owned());
                out.push((id, path));
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                extract_references(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for v in map.values() {
                extract_references(v, out);
            }
        }
        _ => {}
    }
}

/// DAG validation (`spec.md §4.10`): duplicate ids and forward/unknown
/// references both fail before any step executes.
pub fn validate_dag(steps: &[Step]) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.id.clone()) {
            return Err(EngineError::DuplicateStepId { id: step.id.clone() });
        }
    }

    let mut earlier: HashSet<&str> = HashSet::new();
    for (index, step) in steps.iter().enumerate() {
        let mut refs = Vec::new();
        extract_references(&step.args, &mut refs);
        for (id, _path) in refs {
            if !earlier.contains(id.as_str()) {
                return Err(EngineError::ForwardReference {
                    step_index: index,
                    step_id: step.id.clone(),
                    referent: id,
                });
            }
        }
        earlier.insert(step.id.as_str());
    }
    Ok(())
}

/// Substitute every `${id}`/`${id.path}` reference in `value` with the
/// recorded result (or a readable rendering of a composite result).
fn substitute(
    value: &serde_json::Value,
    results: &HashMap<String, serde_json::Value>,
    step_id: &str,
) -> Result<serde_json::Value, EngineError> {
    match value {
        serde_json::Value::String(s) => {
            let pattern = reference_pattern();
            if let Some(cap) = pattern.captures(s) {
                if cap.get(0).map(|m| m.as_str()) == Some(s.as_str()) {
                    // The whole string is exactly one reference: substitute the typed value.
                    return resolve_reference(&cap[1], cap.get(2).map(|m| m.as_str().trim_start_matches('.')), results, step_id);
                }
            }
            let mut out = s.clone();
            let mut replaced_any = false;
            for cap in pattern.captures_iter(s) {
                replaced_any = true;
                let resolved = resolve_reference(
                    &cap[1],
                    cap.get(2).map(|m| m.as_str().trim_start_matches('.')),
                    results,
                    step_id,
                )?;
                let rendering = match resolved {
                    serde_json::Value::String(ref rs) => rs.clone(),
                    other => other.to_string(),
                };
                out = out.replacen(&cap[0], &rendering, 1);
            }
            Ok(if replaced_any { serde_json::Value::String(out) } else { value.clone() })
        }
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(substitute(item, results, step_id)?);
            }
            Ok(serde_json::Value::Array(out))
        }
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), substitute(v, results, step_id)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_reference(
    id: &str,
    path: Option<&str>,
    results: &HashMap<String, serde_json::Value>,
    step_id: &str,
) -> Result<serde_json::Value, EngineError> {
    let result = results
        .get(id)
        .ok_or_else(|| EngineError::FieldNotFound { step_id: step_id.to_owned(), path: id.to_owned() })?;
    let Some(path) = path else {
        return Ok(result.clone());
    };
    let mut current = result;
    for segment in path.split('.') {
        current = current.get(segment).ok_or_else(|| EngineError::FieldNotFound {
            step_id: step_id.to_owned(),
            path: format!("{id}.{path}"),
        })?;
    }
    Ok(current.clone())
}

/// Sequential execution (`spec.md §4.10`): `dispatch` re-enters the
/// Dispatcher's `call_tool` for the substituted step. Halts on the first
/// failure, returning a partial report.
pub async fn execute_chain<F, Fut>(steps: &[Step], mut dispatch: F) -> ChainReport
where
    F: FnMut(String, serde_json::Value) -> Fut,
    Fut: std::future::Future<Output = Result<serde_json::Value, EngineError>>,
{
    let mut results: HashMap<String, serde_json::Value> = HashMap::new();
    let mut completed = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        let substituted = match substitute(&step.args, &results, &step.id) {
            Ok(v) => v,
            Err(e) => {
                return ChainReport {
                    completed,
                    results: None,
                    failure: Some(ChainFailure { step_index: index, step_id: step.id.clone(), error: e.to_string() }),
                };
            }
        };

        match dispatch(step.tool.clone(), substituted).await {
            Ok(result) => {
                results.insert(step.id.clone(), result.clone());
                completed.push(StepOutcome { id: step.id.clone(), tool: step.tool.clone(), result });
            }
            Err(e) => {
                return ChainReport {
                    completed,
                    results: None,
                    failure: Some(ChainFailure { step_index: index, step_id: step.id.clone(), error: e.to_string() }),
                };
            }
        }
    }

    ChainReport { completed, results: Some(results), failure: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, tool: &str, args: serde_json::Value) -> Step {
        Step { id: id.to_owned(), tool: tool.to_owned(), args }
    }

    #[test]
    fn duplicate_step_id_rejected() {
        let steps = vec![step("a", "t", serde_json::json!({})), step("a", "u", serde_json::json!({}))];
        let err = validate_dag(&steps).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateStepId { .. }));
    }

    #[test]
    fn forward_reference_rejected_at_correct_index() {
        let steps = vec![
            step("a", "t", serde_json::json!({"x": "${b}"})),
            step("b", "u", serde_json::json!({})),
        ];
        let err = validate_dag(&steps).unwrap_err();
        match err {
            EngineError::ForwardReference { step_index, referent, .. } => {
                assert_eq!(step_index, 0);
                assert_eq!(referent, "b");
            }
            other => panic!("expected ForwardReference, got {other:?}"),
        }
    }

    #[test]
    fn earlier_reference_is_accepted() {
        let steps = vec![
            step("loc", "get_location", serde_json::json!({})),
            step("g", "greet", serde_json::json!({"name": "${loc.city}"})),
        ];
        assert!(validate_dag(&steps).is_ok());
    }

    #[tokio::test]
    async fn substitution_navigates_nested_path() {
        let steps = vec![
            step("loc", "get_location", serde_json::json!({})),
            step("g", "greet", serde_json::json!({"name": "${loc.city}"})),
        ];
        let report = execute_chain(&steps, |tool, args| async move {
            if tool == "get_location" {
                Ok(serde_json::json!({"city": "Springfield"}))
            } else {
                assert_eq!(args["name"], serde_json::json!("Springfield"));
                Ok(serde_json::json!({"greeting": "hi"}))
            }
        })
        .await;
        assert!(report.failure.is_none());
        assert_eq!(report.completed.len(), 2);
    }

    #[tokio::test]
    async fn missing_nested_path_fails_step_with_field_not_found() {
        let steps = vec![
            step("loc", "get_location", serde_json::json!({})),
            step("g", "greet", serde_json::json!({"name": "${loc.missing}"})),
        ];
        let report = execute_chain(&steps, |tool, _args| async move {
            if tool == "get_location" {
                Ok(serde_json::json!({"city": "Springfield"}))
            } else {
                Ok(serde_json::json!({}))
            }
        })
        .await;
        assert_eq!(report.completed.len(), 1);
        assert!(report.failure.is_some());
    }
}
