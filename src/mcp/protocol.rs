// SPDX-License-Identifier: MIT OR Apache-2.0

//! MCP protocol message handlers: one function per method, mirroring the
//! upstream `ProtocolHandler`'s static-dispatch shape but wired to the
//! Dispatcher (C5) instead of a fitness-provider registry.

use crate::constants::{DEFAULT_PERSONA, SUPPORTED_PROTOCOL_VERSIONS};
use crate::dispatcher::Dispatcher;
use crate::formatters::{format_output, OutputFormat};
use crate::jsonrpc::{error_codes, JsonRpcRequest, JsonRpcResponse};
use crate::mcp::schema::{
    CompletionParams, CompletionResult, Content, InitializeRequest, InitializeResponse, PromptGetParams,
    PromptGetResult, PromptMessage, PromptSchema, ResourceContent, ResourceReadParams, ResourceSchema, ToolCallParams,
    ToolCallResult, ToolSchema,
};
use std::sync::Arc;
use tracing::{error, warn};

pub struct ProtocolHandler;

fn request_id(request: &JsonRpcRequest) -> Option<serde_json::Value> {
    request.id.clone()
}

fn persona_of(request: &JsonRpcRequest) -> String {
    request
        .params
        .as_ref()
        .and_then(|p| p.get("persona"))
        .and_then(|v| v.as_str())
        .map_or_else(|| DEFAULT_PERSONA.to_owned(), str::to_owned)
}

impl ProtocolHandler {
    /// `initialize` (`spec.md §6`): version negotiation against
    /// `SUPPORTED_PROTOCOL_VERSIONS`, newest-first preference.
    #[must_use]
    pub fn handle_initialize(request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request_id(request);
        let Some(init_request) =
            request.params.as_ref().and_then(|p| serde_json::from_value::<InitializeRequest>(p.clone()).ok())
        else {
            return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "invalid initialize request parameters");
        };

        let negotiated = if SUPPORTED_PROTOCOL_VERSIONS.contains(&init_request.protocol_version.as_str()) {
            init_request.protocol_version
        } else {
            SUPPORTED_PROTOCOL_VERSIONS[0].to_owned()
        };

        let response = InitializeResponse::new(negotiated);
        match serde_json::to_value(&response) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                error!("failed to serialize initialize response: {e}");
                JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string())
            }
        }
    }

    #[must_use]
    pub fn handle_ping(request: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(request_id(request), serde_json::json!({}))
    }

    /// `tools/list` (`spec.md §4.5`): persisted + temporary tools for the
    /// caller's persona, `(group, name)`-ordered.
    pub async fn handle_tools_list(dispatcher: &Arc<Dispatcher>, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request_id(request);
        let persona = persona_of(request);
        match dispatcher.list_tools(&persona).await {
            Ok(tools) => {
                let schemas: Vec<ToolSchema> = tools.iter().map(ToolSchema::from).collect();
                JsonRpcResponse::success(id, serde_json::json!({ "tools": schemas }))
            }
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.sanitized_message()),
        }
    }

    /// `tools/call` (`spec.md §4.5`): the result is always recorded to the
    /// audit trail inside `Dispatcher::call_tool` before this handler sees it.
    pub async fn handle_tools_call(dispatcher: &Arc<Dispatcher>, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request_id(request);
        let persona = persona_of(request);
        let Some(params) =
            request.params.as_ref().and_then(|p| serde_json::from_value::<ToolCallParams>(p.clone()).ok())
        else {
            return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "invalid tools/call parameters");
        };

        let format = params.format.as_deref().map_or(OutputFormat::Json, OutputFormat::from_str_param);
        match dispatcher.call_tool(&params.name, &persona, params.arguments).await {
            Ok(result) => {
                let rendered = match format_output(&result, format) {
                    Ok(out) => out.data,
                    Err(e) => return JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
                };
                match serde_json::to_value(ToolCallResult::success(rendered, result)) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
                }
            }
            Err(err) => {
                warn!("tools/call '{}' failed: {}", params.name, err.internal_details());
                let value = serde_json::to_value(ToolCallResult::failure(err.sanitized_message())).unwrap_or_default();
                JsonRpcResponse::success(id, value)
            }
        }
    }

    pub async fn handle_resources_list(dispatcher: &Arc<Dispatcher>, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request_id(request);
        let persona = persona_of(request);
        match dispatcher.list_resources(&persona).await {
            Ok(resources) => {
                let schemas: Vec<ResourceSchema> = resources.iter().map(ResourceSchema::from).collect();
                JsonRpcResponse::success(id, serde_json::json!({ "resources": schemas }))
            }
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.sanitized_message()),
        }
    }

    pub async fn handle_resources_read(dispatcher: &Arc<Dispatcher>, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request_id(request);
        let persona = persona_of(request);
        let Some(params) =
            request.params.as_ref().and_then(|p| serde_json::from_value::<ResourceReadParams>(p.clone()).ok())
        else {
            return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "invalid resources/read parameters");
        };

        match dispatcher.get_resource(&params.uri, &persona).await {
            Ok(body) => {
                let content = ResourceContent { uri: params.uri, mime_type: "text/plain".to_owned(), text: body };
                JsonRpcResponse::success(id, serde_json::json!({ "contents": [content] }))
            }
            Err(e) => JsonRpcResponse::error(id, error_codes::SERVER_ERROR, e.sanitized_message()),
        }
    }

    pub async fn handle_prompts_list(dispatcher: &Arc<Dispatcher>, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request_id(request);
        let persona = persona_of(request);
        match dispatcher.list_prompts(&persona).await {
            Ok(prompts) => {
                let schemas: Vec<PromptSchema> = prompts.iter().map(PromptSchema::from).collect();
                JsonRpcResponse::success(id, serde_json::json!({ "prompts": schemas }))
            }
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.sanitized_message()),
        }
    }

    pub async fn handle_prompts_get(dispatcher: &Arc<Dispatcher>, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request_id(request);
        let persona = persona_of(request);
        let Some(params) =
            request.params.as_ref().and_then(|p| serde_json::from_value::<PromptGetParams>(p.clone()).ok())
        else {
            return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "invalid prompts/get parameters");
        };

        match dispatcher.get_prompt(&params.name, &persona, &params.arguments).await {
            Ok(rendered) => {
                let result = PromptGetResult {
                    description: params.name,
                    messages: vec![PromptMessage { role: "user", content: Content::Text { text: rendered } }],
                };
                match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
                }
            }
            Err(e) => JsonRpcResponse::error(id, error_codes::SERVER_ERROR, e.sanitized_message()),
        }
    }

    /// `completion/complete`: argument-name/value completion restricted to a
    /// prompt's declared arguments (`spec.md §6`; not a general sandboxed
    /// completion surface — that is explicitly out of scope).
    pub async fn handle_completion(dispatcher: &Arc<Dispatcher>, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request_id(request);
        let persona = persona_of(request);
        let Some(params) =
            request.params.as_ref().and_then(|p| serde_json::from_value::<CompletionParams>(p.clone()).ok())
        else {
            return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "invalid completion/complete parameters");
        };

        let prompts = match dispatcher.list_prompts(&persona).await {
            Ok(p) => p,
            Err(e) => return JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.sanitized_message()),
        };

        let values: Vec<String> = prompts
            .iter()
            .find(|p| p.name == params.reference.name)
            .map(|p| {
                p.arguments_schema
                    .iter()
                    .map(|a| a.name.clone())
                    .filter(|name| name.starts_with(&params.argument.value))
                    .collect()
            })
            .unwrap_or_default();

        let total = values.len();
        let result = CompletionResult { values, total, has_more: false };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, serde_json::json!({ "completion": value })),
            Err(e) => JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, e.to_string()),
        }
    }

    #[must_use]
    pub fn handle_unknown_method(request: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::error(request_id(request), error_codes::METHOD_NOT_FOUND, format!("unknown method: {}", request.method))
    }
}
