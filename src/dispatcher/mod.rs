// SPDX-License-Identifier: MIT OR Apache-2.0

//! C5 — Dispatcher: the single point of entry for tool/resource/prompt
//! resolution and invocation. Owns the meta-session (registry/audit
//! storage), the optional data-session, and the process-local temporary
//! registry; routes a resolved artifact to C6 or C7 and records the outcome
//! via C9 regardless of success.

use crate::audit;
use crate::database::{DataSession, Database, DatabaseProvider};
use crate::errors::{AppError, AppResult, EngineError, ErrorCode};
use crate::executor::{execute_script_tool, execute_sql_tool, ExecContext, SubExecutorFn};
use crate::registry::models::{ResourceRecord, ToolRecord};
use crate::registry::temp::TempRegistry;
use crate::validator::{validate_script, EffectivePolicy};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const TEMP_ROW_LIMIT: i64 = crate::constants::TEMP_TOOL_ROW_LIMIT;

pub struct Dispatcher {
    meta: Database,
    data: RwLock<Option<DataSession>>,
    temp: TempRegistry,
}

impl Dispatcher {
    #[must_use]
    pub fn new(meta: Database, data: Option<DataSession>) -> Arc<Self> {
        Arc::new(Self { meta, data: RwLock::new(data), temp: TempRegistry::new() })
    }

    #[must_use]
    pub fn temp_registry(&self) -> &TempRegistry {
        &self.temp
    }

    #[must_use]
    pub fn meta_session(&self) -> &Database {
        &self.meta
    }

    pub async fn set_data_session(&self, session: Option<DataSession>) {
        *self.data.write().await = session;
    }

    pub async fn data_session(&self) -> Option<DataSession> {
        self.data.read().await.clone()
    }

    pub async fn reconnect_data_session(&self, url: &str) -> AppResult<()> {
        let session = DataSession::connect(url).await?;
        session.ping().await?;
        *self.data.write().await = Some(session);
        Ok(())
    }

    /// `list_tools(persona)` (`spec.md §4.5`): persisted + temporary tools,
    /// ordered by `(group, name)`.
    pub async fn list_tools(&self, persona: &str) -> AppResult<Vec<ToolRecord>> {
        let mut tools = self.meta.list_tools(persona).await?;
        tools.extend(self.temp.list_tools_for_persona(persona));
        tools.sort_by(|a, b| (a.group.as_str(), a.name.as_str()).cmp(&(b.group.as_str(), b.name.as_str())));
        Ok(tools)
    }

    pub async fn list_resources(&self, persona: &str) -> AppResult<Vec<ResourceRecord>> {
        let mut resources = self.meta.list_resources(persona).await?;
        resources.extend(self.temp.list_resources_for_persona(persona));
        resources.sort_by(|a, b| (a.group.as_str(), a.name.as_str()).cmp(&(b.group.as_str(), b.name.as_str())));
        Ok(resources)
    }

    pub async fn list_prompts(&self, persona: &str) -> AppResult<Vec<crate::registry::models::PromptRecord>> {
        let mut prompts = self.meta.list_prompts(persona).await?;
        prompts.sort_by(|a, b| (a.group.as_str(), a.name.as_str()).cmp(&(b.group.as_str(), b.name.as_str())));
        Ok(prompts)
    }

    async fn effective_policy(&self) -> AppResult<EffectivePolicy> {
        let policies = self.meta.list_active_policies().await?;
        Ok(EffectivePolicy::resolve(&policies))
    }

    fn resolve_tool(&self, name: &str, persona: &str) -> Option<ToolRecord> {
        self.temp.get_tool(name, persona)
    }

    /// `call_tool(name, persona, arguments)` (`spec.md §4.5`). Always
    /// records an ExecutionLog entry, success or failure, before returning.
    pub async fn call_tool(
        self: &Arc<Self>,
        name: &str,
        persona: &str,
        arguments: serde_json::Value,
    ) -> AppResult<serde_json::Value> {
        match self.call_tool_inner(name, persona, &arguments).await {
            Ok(result) => {
                audit::record_success(&self.meta, name, persona, &arguments, &result).await?;
                Ok(result)
            }
            Err(err) => {
                audit::record_failure(&self.meta, name, persona, &arguments, &err.internal_details()).await?;
                Err(err)
            }
        }
    }

    async fn call_tool_inner(
        self: &Arc<Self>,
        name: &str,
        persona: &str,
        arguments: &serde_json::Value,
    ) -> AppResult<serde_json::Value> {
        let record = match self.resolve_tool(name, persona) {
            Some(r) => r,
            None => self
                .meta
                .get_tool(name, persona)
                .await?
                .ok_or_else(|| AppError::from(EngineError::ToolNotFound { name: name.to_owned(), persona: persona.to_owned() }))?,
        };

        let artifact = self
            .meta
            .get_artifact(&record.artifact_digest)
            .await?
            .ok_or_else(|| AppError::from(EngineError::ArtifactMissing { digest: record.artifact_digest.clone(), referrer: name.to_owned() }))?;

        if !artifact.verify_integrity() {
            return Err(AppError::from(EngineError::ArtifactCorrupt { digest: artifact.digest.clone() }));
        }

        let is_temp = self.resolve_tool(name, persona).is_some();

        match artifact.kind {
            crate::artifact::ArtifactKind::Select => {
                let macros = self.meta.list_active_macros().await?;
                let data = self.data.read().await;
                let row_limit = is_temp.then_some(TEMP_ROW_LIMIT);
                let rows = execute_sql_tool(&artifact.body, arguments, &macros, data.as_ref(), row_limit)
                    .await
                    .map_err(AppError::from)?;
                Ok(serde_json::Value::Array(rows.into_iter().map(serde_json::Value::Object).collect()))
            }
            crate::artifact::ArtifactKind::Script => {
                let policy = self.effective_policy().await?;
                validate_script(&artifact.body, &policy)?;
                let ctx = self.build_exec_context(name, persona).await;
                execute_script_tool(&artifact.body, arguments, ctx).await.map_err(AppError::from)
            }
            crate::artifact::ArtifactKind::Ui => {
                // Dashboards are never dispatched for execution; only referenced via URL (§6).
                Err(AppError::new(ErrorCode::InvalidInput, "cannot dispatch an artifact of kind 'ui'"))
            }
        }
    }

    async fn build_exec_context(self: &Arc<Self>, tool_name: &str, persona: &str) -> ExecContext {
        let dispatcher = Arc::clone(self);
        let persona_owned = persona.to_owned();
        let sub_executor: SubExecutorFn = Arc::new(move |tool, sub_persona, args| {
            let dispatcher = Arc::clone(&dispatcher);
            Box::pin(async move {
                dispatcher
                    .call_tool(&tool, &sub_persona, args)
                    .await
                    .map_err(|e| EngineError::InvalidInput(format!("sub_executor call to '{tool}' failed: {}", e.internal_details())))
            })
        });
        ExecContext {
            persona: persona_owned,
            tool_name: tool_name.to_owned(),
            data_session: self.data.read().await.clone(),
            sub_executor,
        }
    }

    /// `get_resource(uri, persona)`: static resources return their body
    /// verbatim; dynamic resources are executed via C7.
    pub async fn get_resource(self: &Arc<Self>, uri: &str, persona: &str) -> AppResult<String> {
        let record = match self.temp.get_resource(uri, persona) {
            Some(r) => r,
            None => self
                .meta
                .get_resource(uri, persona)
                .await?
                .ok_or_else(|| AppError::new(ErrorCode::ResourceNotFound, format!("no resource '{uri}' for persona '{persona}'")))?,
        };

        if !record.is_dynamic {
            return record
                .static_body
                .ok_or_else(|| AppError::new(ErrorCode::InternalError, "static resource missing its body"));
        }

        let digest = record
            .artifact_digest
            .ok_or_else(|| AppError::new(ErrorCode::InternalError, "dynamic resource missing its artifact digest"))?;
        let artifact = self
            .meta
            .get_artifact(&digest)
            .await?
            .ok_or_else(|| AppError::from(EngineError::ArtifactMissing { digest: digest.clone(), referrer: uri.to_owned() }))?;
        if !artifact.verify_integrity() {
            return Err(AppError::from(EngineError::ArtifactCorrupt { digest }));
        }

        let policy = self.effective_policy().await?;
        validate_script(&artifact.body, &policy)?;
        let ctx = self.build_exec_context(uri, persona).await;
        let result = execute_script_tool(&artifact.body, &serde_json::json!({}), ctx).await?;
        Ok(match result {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
    }

    /// `get_prompt(name, persona, arguments)`: substitutes `{name}`
    /// placeholders into the stored template.
    pub async fn get_prompt(&self, name: &str, persona: &str, arguments: &serde_json::Value) -> AppResult<String> {
        let record = self
            .meta
            .get_prompt(name, persona)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ResourceNotFound, format!("no prompt '{name}' for persona '{persona}'")))?;

        let values: HashMap<&str, String> = arguments
            .as_object()
            .map(|obj| obj.iter().map(|(k, v)| (k.as_str(), display_arg(v))).collect())
            .unwrap_or_default();

        let mut rendered = record.template.clone();
        for arg in &record.arguments_schema {
            let placeholder = format!("{{{}}}", arg.name);
            match values.get(arg.name.as_str()) {
                Some(v) => rendered = rendered.replace(&placeholder, v),
                None if arg.required => {
                    return Err(AppError::from(EngineError::MissingArgument { name: arg.name.clone() }));
                }
                None => {}
            }
        }
        Ok(rendered)
    }
}

fn display_arg(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
