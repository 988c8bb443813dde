// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool/resource/prompt/macro/dashboard creation meta-tools
//! (`spec.md §4.8`).

use crate::artifact::ArtifactKind;
use crate::constants::DEFAULT_PERSONA;
use crate::database::DatabaseProvider;
use crate::dispatcher::Dispatcher;
use crate::errors::{AppError, AppResult, EngineError, ErrorCode};
use crate::registry::models::{MacroRecord, PromptArgument, PromptRecord, ResourceRecord, ToolRecord, ToolState};
use crate::validator::validate_sql;
use regex::Regex;
use std::sync::OnceLock;

fn template_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{%.*?%\}|\{\{.*?\}\}").expect("static pattern"))
}

/// Strip template control-flow/interpolation syntax before running the
/// as-written pre-check (`spec.md §4.8`: "a relaxed pre-check is applied").
fn strip_template_syntax(body: &str) -> String {
    template_tag_pattern().replace_all(body, " ").into_owned()
}

/// Build a JSON-Schema-like `input_schema` from the `{name: {type,
/// description, required}}` map a caller supplies.
fn synthesize_input_schema(parameters: &serde_json::Value) -> AppResult<serde_json::Value> {
    let Some(params) = parameters.as_object() else {
        return Err(AppError::new(ErrorCode::InvalidInput, "parameters must be an object"));
    };

    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for (name, spec) in params {
        let ty = spec.get("type").and_then(|v| v.as_str()).unwrap_or("string");
        let description = spec.get("description").and_then(|v| v.as_str()).unwrap_or("");
        properties.insert(name.clone(), serde_json::json!({"type": ty, "description": description}));
        if spec.get("required").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            required.push(serde_json::Value::String(name.clone()));
        }
    }

    Ok(serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    }))
}

fn group_for(tool_name: &str) -> String {
    tool_name.split_once('_').map_or_else(|| tool_name.to_owned(), |(prefix, _)| prefix.to_owned())
}

/// State for a (re-)created record (`spec.md §4.8` state machine): a brand
/// new `(name, persona)` starts `Created`; re-pointing an existing record at
/// a different artifact digest is an update, not a fresh creation, and
/// resets `Verified` back to `Updated`. Re-issuing the identical digest
/// leaves whatever state the record already carried untouched.
fn next_state(existing: Option<&ToolRecord>, new_digest: &str) -> ToolState {
    match existing {
        Some(prev) if prev.artifact_digest != new_digest => ToolState::Updated,
        Some(prev) => prev.state,
        None => ToolState::Created,
    }
}

pub struct NewSqlTool<'a> {
    pub tool_name: &'a str,
    pub description: &'a str,
    pub sql_query: &'a str,
    pub parameters: &'a serde_json::Value,
}

/// `create_new_sql_tool` (`spec.md §4.8`).
pub async fn create_new_sql_tool(dispatcher: &Dispatcher, input: NewSqlTool<'_>) -> AppResult<ToolRecord> {
    let relaxed = strip_template_syntax(input.sql_query);
    validate_sql(&relaxed)?;

    let digest = dispatcher.meta_session().put_artifact(input.sql_query, ArtifactKind::Select).await?;
    let input_schema = synthesize_input_schema(input.parameters)?;

    let existing = dispatcher.meta_session().get_tool(input.tool_name, DEFAULT_PERSONA).await?;
    let state = next_state(existing.as_ref(), &digest);

    let record = ToolRecord {
        name: input.tool_name.to_owned(),
        persona: DEFAULT_PERSONA.to_owned(),
        description: input.description.to_owned(),
        input_schema,
        artifact_digest: digest,
        is_auto_created: true,
        group: group_for(input.tool_name),
        manual: None,
        state,
    };
    dispatcher.meta_session().upsert_tool(&record).await?;
    Ok(record)
}

pub struct NewPrompt<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub template: &'a str,
    pub arguments: Vec<PromptArgument>,
}

pub async fn create_new_prompt(dispatcher: &Dispatcher, input: NewPrompt<'_>) -> AppResult<PromptRecord> {
    let record = PromptRecord {
        name: input.name.to_owned(),
        persona: DEFAULT_PERSONA.to_owned(),
        description: input.description.to_owned(),
        template: input.template.to_owned(),
        arguments_schema: input.arguments,
        group: group_for(input.name),
    };
    dispatcher.meta_session().upsert_prompt(&record).await?;
    Ok(record)
}

pub struct NewResource<'a> {
    pub uri: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub mime_type: &'a str,
    pub static_body: &'a str,
}

/// Resources created through this meta-tool are always static
/// (`spec.md §4.8`: "the dynamic form is reserved for spec-load").
pub async fn create_new_resource(dispatcher: &Dispatcher, input: NewResource<'_>) -> AppResult<ResourceRecord> {
    let record = ResourceRecord {
        uri: input.uri.to_owned(),
        persona: DEFAULT_PERSONA.to_owned(),
        name: input.name.to_owned(),
        description: input.description.to_owned(),
        mime_type: input.mime_type.to_owned(),
        is_dynamic: false,
        static_body: Some(input.static_body.to_owned()),
        artifact_digest: None,
        group: group_for(input.name),
    };
    dispatcher.meta_session().upsert_resource(&record).await?;
    Ok(record)
}

/// `create_temp_tool`: same shape as `create_new_sql_tool`, targeting the
/// in-memory registry; no persistence.
pub async fn create_temp_tool(dispatcher: &Dispatcher, input: NewSqlTool<'_>) -> AppResult<ToolRecord> {
    let relaxed = strip_template_syntax(input.sql_query);
    validate_sql(&relaxed)?;

    let digest = dispatcher.meta_session().put_artifact(input.sql_query, ArtifactKind::Select).await?;
    let input_schema = synthesize_input_schema(input.parameters)?;

    let existing = dispatcher.temp_registry().get_tool(input.tool_name, DEFAULT_PERSONA);
    let state = next_state(existing.as_ref(), &digest);

    let record = ToolRecord {
        name: input.tool_name.to_owned(),
        persona: DEFAULT_PERSONA.to_owned(),
        description: input.description.to_owned(),
        input_schema,
        artifact_digest: digest,
        is_auto_created: true,
        group: group_for(input.tool_name),
        manual: None,
        state,
    };
    dispatcher.temp_registry().put_tool(record.clone());
    Ok(record)
}

pub async fn create_temp_resource(dispatcher: &Dispatcher, input: NewResource<'_>) -> AppResult<ResourceRecord> {
    let record = ResourceRecord {
        uri: input.uri.to_owned(),
        persona: DEFAULT_PERSONA.to_owned(),
        name: input.name.to_owned(),
        description: input.description.to_owned(),
        mime_type: input.mime_type.to_owned(),
        is_dynamic: false,
        static_body: Some(input.static_body.to_owned()),
        artifact_digest: None,
        group: group_for(input.name),
    };
    dispatcher.temp_registry().put_resource(record.clone());
    Ok(record)
}

/// `register_macro` (`spec.md §4.8`): the body must open and close a single
/// macro definition.
pub async fn register_macro(dispatcher: &Dispatcher, name: &str, description: &str, template: &str) -> AppResult<MacroRecord> {
    let trimmed = template.trim();
    if !trimmed.starts_with("{% macro") {
        return Err(AppError::from(EngineError::InvalidStructure {
            reason: "macro body must begin with '{% macro ... %}'".to_owned(),
        }));
    }
    if !trimmed.ends_with("{% endmacro %}") {
        return Err(AppError::from(EngineError::InvalidStructure {
            reason: "macro body must end with '{% endmacro %}'".to_owned(),
        }));
    }

    let record = MacroRecord {
        name: name.to_owned(),
        description: description.to_owned(),
        template: template.to_owned(),
        is_active: true,
    };
    dispatcher.meta_session().upsert_macro(&record).await?;
    Ok(record)
}

/// `create_dashboard` (`spec.md §4.8`): stores a `ui`-kind artifact; never
/// registers a dispatchable ToolRecord for it.
pub async fn create_dashboard(dispatcher: &Dispatcher, ui_body: &str) -> AppResult<String> {
    dispatcher.meta_session().put_artifact(ui_body, ArtifactKind::Ui).await
}

/// `remove_tool` (`spec.md §4.8` state machine): drives a tool to its
/// terminal `Removed` state by deleting its registry record outright — there
/// is no `Removed` row left behind to read back, matching "terminal states
/// are `REMOVED` (record deleted)".
pub async fn remove_tool(dispatcher: &Dispatcher, tool_name: &str, persona: &str) -> AppResult<()> {
    dispatcher
        .meta_session()
        .get_tool(tool_name, persona)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ToolNotFound, format!("no tool '{tool_name}' for persona '{persona}'")))?;
    dispatcher.meta_session().delete_tool(tool_name, persona).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_template_control_flow_before_precheck() {
        let body = "SELECT 1 {% if arguments.x %} AND x = :x {% endif %}";
        let stripped = strip_template_syntax(body);
        assert!(!stripped.contains("{%"));
        assert!(validate_sql(&stripped).is_ok());
    }

    #[test]
    fn synthesizes_schema_with_required_list() {
        let params = serde_json::json!({"store": {"type": "string", "description": "store code", "required": true}});
        let schema = synthesize_input_schema(&params).unwrap();
        assert_eq!(schema["required"], serde_json::json!(["store"]));
    }

    fn sample_record(digest: &str, state: ToolState) -> ToolRecord {
        ToolRecord {
            name: "t".to_owned(),
            persona: DEFAULT_PERSONA.to_owned(),
            description: String::new(),
            input_schema: serde_json::json!({}),
            artifact_digest: digest.to_owned(),
            is_auto_created: true,
            group: "t".to_owned(),
            manual: None,
            state,
        }
    }

    #[test]
    fn brand_new_tool_starts_created() {
        assert_eq!(next_state(None, "abc"), ToolState::Created);
    }

    #[test]
    fn new_digest_on_existing_tool_is_updated() {
        let prev = sample_record("abc", ToolState::Verified);
        assert_eq!(next_state(Some(&prev), "def"), ToolState::Updated);
    }

    #[test]
    fn same_digest_keeps_existing_state() {
        let prev = sample_record("abc", ToolState::Verified);
        assert_eq!(next_state(Some(&prev), "abc"), ToolState::Verified);
    }
}
