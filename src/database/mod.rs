// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database abstraction. [`DatabaseProvider`] is the trait every backend
//! implements; [`factory::Database`] is the enum that dispatches to the
//! backend selected at runtime by the connection URL's scheme, mirroring the
//! upstream codebase's `database_plugins` split between a provider trait and
//! a concrete enum (rather than `Arc<dyn Trait>` object dispatch, since the
//! set of backends is closed and known at compile time).

pub mod data_session;
pub mod factory;
pub mod sqlite;
#[cfg(feature = "postgresql")]
pub mod postgres;

pub use data_session::DataSession;
pub use factory::Database;

use crate::artifact::{Artifact, ArtifactKind};
use crate::errors::AppResult;
use crate::registry::models::{
    ExecutionLog, ExecutionStatus, IconRecord, MacroRecord, NotebookEntry, NotebookHistoryEntry,
    PromptRecord, ResourceRecord, SecurityPolicy, ToolRecord,
};
use async_trait::async_trait;

/// Input to `insert_execution_log`; the id/timestamp are assigned by the
/// store, not the caller (`spec.md §3` ExecutionLog: "auto-id").
#[derive(Debug, Clone)]
pub struct ExecutionLogInput {
    pub tool_name: String,
    pub persona: String,
    pub arguments: serde_json::Value,
    pub status: ExecutionStatus,
    pub result_summary: String,
    pub error_traceback: Option<String>,
}

/// Persistence contract for the Registry (C2), Artifact Store (C1), and
/// Audit (C9). Implemented once per backend (SQLite, optionally PostgreSQL).
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// Create all tables if absent. Idempotent; safe to call on every startup.
    async fn migrate(&self) -> AppResult<()>;

    // --- C1 Artifact Store ---------------------------------------------
    async fn put_artifact(&self, body: &str, kind: ArtifactKind) -> AppResult<String>;
    async fn get_artifact(&self, digest: &str) -> AppResult<Option<Artifact>>;

    // --- C2 Registry: tools ----------------------------------------------
    async fn upsert_tool(&self, record: &ToolRecord) -> AppResult<()>;
    async fn get_tool(&self, name: &str, persona: &str) -> AppResult<Option<ToolRecord>>;
    async fn list_tools(&self, persona: &str) -> AppResult<Vec<ToolRecord>>;
    async fn delete_tool(&self, name: &str, persona: &str) -> AppResult<()>;

    // --- C2 Registry: resources -------------------------------------------
    async fn upsert_resource(&self, record: &ResourceRecord) -> AppResult<()>;
    async fn get_resource(&self, uri: &str, persona: &str) -> AppResult<Option<ResourceRecord>>;
    async fn list_resources(&self, persona: &str) -> AppResult<Vec<ResourceRecord>>;

    // --- C2 Registry: prompts ----------------------------------------------
    async fn upsert_prompt(&self, record: &PromptRecord) -> AppResult<()>;
    async fn get_prompt(&self, name: &str, persona: &str) -> AppResult<Option<PromptRecord>>;
    async fn list_prompts(&self, persona: &str) -> AppResult<Vec<PromptRecord>>;

    // --- C2 Registry: macros -----------------------------------------------
    async fn upsert_macro(&self, record: &MacroRecord) -> AppResult<()>;
    async fn list_active_macros(&self) -> AppResult<Vec<MacroRecord>>;

    // --- C2 Registry: icons ------------------------------------------------
    async fn upsert_icon(&self, record: &IconRecord) -> AppResult<()>;
    async fn get_icon(&self, name: &str) -> AppResult<Option<IconRecord>>;

    // --- C2 Registry: security policies ------------------------------------
    async fn upsert_policy(&self, policy: &SecurityPolicy) -> AppResult<()>;
    async fn list_active_policies(&self) -> AppResult<Vec<SecurityPolicy>>;

    // --- C9 Audit: execution log --------------------------------------------
    async fn insert_execution_log(&self, entry: ExecutionLogInput) -> AppResult<()>;
    async fn get_last_failure(&self, tool_name: Option<&str>) -> AppResult<Option<ExecutionLog>>;

    // --- C9 Audit: notebook --------------------------------------------------
    async fn get_notebook_entry(&self, domain: &str, key: &str) -> AppResult<Option<NotebookEntry>>;
    async fn upsert_notebook_entry(
        &self,
        domain: &str,
        key: &str,
        value: &str,
        updated_by: &str,
    ) -> AppResult<()>;
    async fn append_notebook_history(&self, entry: NotebookHistoryEntry) -> AppResult<()>;
    async fn list_notebook_history(&self, domain: &str, key: &str) -> AppResult<Vec<NotebookHistoryEntry>>;
}
