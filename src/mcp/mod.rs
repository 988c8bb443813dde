// SPDX-License-Identifier: MIT OR Apache-2.0

//! External interface (`spec.md §6`): `McpRequest`/`McpResponse` envelope
//! types (aliased onto the shared `jsonrpc` module) and a `Dispatcher`-backed
//! handler per MCP method. Wire framing (stdio loop, SSE) is a thin adapter
//! left to `bin/server.rs`; this module only knows how to turn one
//! already-parsed request into one response.

pub mod protocol;
pub mod schema;

pub use crate::jsonrpc::{JsonRpcRequest as McpRequest, JsonRpcResponse as McpResponse};
pub use protocol::ProtocolHandler;

use crate::dispatcher::Dispatcher;
use std::sync::Arc;

/// Route a parsed MCP request to the matching handler
/// (`spec.md §6`'s method list: `initialize`, `ping`, `tools/list`,
/// `tools/call`, `resources/list`, `resources/read`, `prompts/list`,
/// `prompts/get`, `completion/complete`).
pub async fn dispatch(dispatcher: &Arc<Dispatcher>, request: McpRequest) -> McpResponse {
    match request.method.as_str() {
        "initialize" => ProtocolHandler::handle_initialize(&request),
        "ping" => ProtocolHandler::handle_ping(&request),
        "tools/list" => ProtocolHandler::handle_tools_list(dispatcher, &request).await,
        "tools/call" => ProtocolHandler::handle_tools_call(dispatcher, &request).await,
        "resources/list" => ProtocolHandler::handle_resources_list(dispatcher, &request).await,
        "resources/read" => ProtocolHandler::handle_resources_read(dispatcher, &request).await,
        "prompts/list" => ProtocolHandler::handle_prompts_list(dispatcher, &request).await,
        "prompts/get" => ProtocolHandler::handle_prompts_get(dispatcher, &request).await,
        "completion/complete" => ProtocolHandler::handle_completion(dispatcher, &request).await,
        _ => ProtocolHandler::handle_unknown_method(&request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseProvider as _;

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let db = crate::database::Database::new("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let dispatcher = Dispatcher::new(db, None);
        let request = McpRequest::new("bogus/method", None);
        let response = dispatch(&dispatcher, request).await;
        assert!(response.error.is_some());
    }
}
