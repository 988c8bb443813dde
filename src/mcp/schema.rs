// SPDX-License-Identifier: MIT OR Apache-2.0

//! MCP protocol schema definitions: the wire shapes returned by
//! `tools/list`, `tools/call`, `resources/list`, `resources/read`,
//! `prompts/list`, and `prompts/get` (`spec.md §6`).

use crate::registry::models::{PromptRecord, ResourceRecord, ToolRecord};
use serde::{Deserialize, Serialize};

pub const SERVER_NAME: &str = "registry-mcp-server";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
    pub resources: ResourcesCapability,
    pub prompts: PromptsCapability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "clientInfo", default)]
    pub client_info: Option<ServerInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    pub capabilities: ServerCapabilities,
}

impl InitializeResponse {
    #[must_use]
    pub fn new(protocol_version: String) -> Self {
        Self {
            protocol_version,
            server_info: ServerInfo { name: SERVER_NAME.to_owned(), version: SERVER_VERSION.to_owned() },
            capabilities: ServerCapabilities {
                tools: ToolsCapability { list_changed: false },
                resources: ResourcesCapability { list_changed: false },
                prompts: PromptsCapability { list_changed: false },
            },
        }
    }
}

/// `tools/list` entry shape. `input_schema` is already a JSON-Schema-shaped
/// `serde_json::Value` synthesized at tool-creation time (`meta_tools::registry_tools`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

impl From<&ToolRecord> for ToolSchema {
    fn from(record: &ToolRecord) -> Self {
        Self { name: record.name.clone(), description: record.description.clone(), input_schema: record.input_schema.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl From<&ResourceRecord> for ResourceSchema {
    fn from(record: &ResourceRecord) -> Self {
        Self {
            uri: record.uri.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            mime_type: record.mime_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgumentSchema {
    pub name: String,
    pub description: String,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSchema {
    pub name: String,
    pub description: String,
    pub arguments: Vec<PromptArgumentSchema>,
}

impl From<&PromptRecord> for PromptSchema {
    fn from(record: &PromptRecord) -> Self {
        Self {
            name: record.name.clone(),
            description: record.description.clone(),
            arguments: record
                .arguments_schema
                .iter()
                .map(|a| PromptArgumentSchema { name: a.name.clone(), description: a.description.clone(), required: a.required })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    /// Output-rendering hint (`spec.md §6`: `_format ∈ {json, toon}`),
    /// governing only the final text rendering of a successful result.
    #[serde(rename = "_format", default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError")]
    pub is_error: bool,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
}

impl ToolCallResult {
    /// `text` is the already-rendered representation (`spec.md §6`'s
    /// `_format` hint governs only this rendering); `structured_content`
    /// always carries the untransformed result value.
    #[must_use]
    pub fn success(text: String, result: serde_json::Value) -> Self {
        Self { content: vec![Content::Text { text }], is_error: false, structured_content: Some(result) }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self { content: vec![Content::Text { text: message.into() }], is_error: true, structured_content: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceReadParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptGetParams {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: Content,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptGetResult {
    pub description: String,
    pub messages: Vec<PromptMessage>,
}

/// `completion/complete` request params: a minimal argument-name completion
/// surface over a prompt's declared arguments (`spec.md §6`).
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionParams {
    pub reference: CompletionReference,
    pub argument: CompletionArgument,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionReference {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionArgument {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub values: Vec<String>,
    pub total: usize,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}
