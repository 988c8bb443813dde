// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime backend selection by connection-URL scheme, mirroring the
//! upstream `database_plugins::factory` module's `Database` enum + manual
//! per-variant match dispatch (rather than `Arc<dyn DatabaseProvider>`).

use super::sqlite::SqliteDatabase;
#[cfg(feature = "postgresql")]
use super::postgres::PostgresDatabase;
use super::{DatabaseProvider, ExecutionLogInput};
use crate::artifact::{Artifact, ArtifactKind};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::registry::models::{
    ExecutionLog, IconRecord, MacroRecord, NotebookEntry, NotebookHistoryEntry, PromptRecord,
    ResourceRecord, SecurityPolicy, ToolRecord,
};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    Sqlite,
    PostgreSql,
}

fn detect_database_type(url: &str) -> AppResult<DatabaseType> {
    if url.starts_with("sqlite:") {
        Ok(DatabaseType::Sqlite)
    } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
        Ok(DatabaseType::PostgreSql)
    } else {
        Err(AppError::new(
            ErrorCode::ConfigError,
            format!("cannot determine database backend from url '{url}'"),
        ))
    }
}

/// Concrete backend chosen at runtime. Cheaply `Clone` (pool handles inside).
#[derive(Clone)]
pub enum Database {
    Sqlite(SqliteDatabase),
    #[cfg(feature = "postgresql")]
    PostgreSql(PostgresDatabase),
}

impl Database {
    pub async fn new(database_url: &str) -> AppResult<Self> {
        match detect_database_type(database_url)? {
            DatabaseType::Sqlite => Ok(Self::Sqlite(SqliteDatabase::connect(database_url).await?)),
            DatabaseType::PostgreSql => {
                #[cfg(feature = "postgresql")]
                {
                    Ok(Self::PostgreSql(PostgresDatabase::connect(database_url).await?))
                }
                #[cfg(not(feature = "postgresql"))]
                {
                    Err(AppError::new(
                        ErrorCode::ConfigError,
                        "postgresql backend requested but the `postgresql` feature is not enabled",
                    ))
                }
            }
        }
    }

    #[must_use]
    pub const fn database_type(&self) -> DatabaseType {
        match self {
            Self::Sqlite(_) => DatabaseType::Sqlite,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(_) => DatabaseType::PostgreSql,
        }
    }
}

#[async_trait]
impl DatabaseProvider for Database {
    async fn migrate(&self) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.migrate().await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.migrate().await,
        }
    }

    async fn put_artifact(&self, body: &str, kind: ArtifactKind) -> AppResult<String> {
        match self {
            Self::Sqlite(db) => db.put_artifact(body, kind).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.put_artifact(body, kind).await,
        }
    }

    async fn get_artifact(&self, digest: &str) -> AppResult<Option<Artifact>> {
        match self {
            Self::Sqlite(db) => db.get_artifact(digest).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.get_artifact(digest).await,
        }
    }

    async fn upsert_tool(&self, record: &ToolRecord) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.upsert_tool(record).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.upsert_tool(record).await,
        }
    }

    async fn get_tool(&self, name: &str, persona: &str) -> AppResult<Option<ToolRecord>> {
        match self {
            Self::Sqlite(db) => db.get_tool(name, persona).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.get_tool(name, persona).await,
        }
    }

    async fn list_tools(&self, persona: &str) -> AppResult<Vec<ToolRecord>> {
        match self {
            Self::Sqlite(db) => db.list_tools(persona).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.list_tools(persona).await,
        }
    }

    async fn delete_tool(&self, name: &str, persona: &str) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.delete_tool(name, persona).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.delete_tool(name, persona).await,
        }
    }

    async fn upsert_resource(&self, record: &ResourceRecord) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.upsert_resource(record).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.upsert_resource(record).await,
        }
    }

    async fn get_resource(&self, uri: &str, persona: &str) -> AppResult<Option<ResourceRecord>> {
        match self {
            Self::Sqlite(db) => db.get_resource(uri, persona).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.get_resource(uri, persona).await,
        }
    }

    async fn list_resources(&self, persona: &str) -> AppResult<Vec<ResourceRecord>> {
        match self {
            Self::Sqlite(db) => db.list_resources(persona).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.list_resources(persona).await,
        }
    }

    async fn upsert_prompt(&self, record: &PromptRecord) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.upsert_prompt(record).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.upsert_prompt(record).await,
        }
    }

    async fn get_prompt(&self, name: &str, persona: &str) -> AppResult<Option<PromptRecord>> {
        match self {
            Self::Sqlite(db) => db.get_prompt(name, persona).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.get_prompt(name, persona).await,
        }
    }

    async fn list_prompts(&self, persona: &str) -> AppResult<Vec<PromptRecord>> {
        match self {
            Self::Sqlite(db) => db.list_prompts(persona).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.list_prompts(persona).await,
        }
    }

    async fn upsert_macro(&self, record: &MacroRecord) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.upsert_macro(record).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.upsert_macro(record).await,
        }
    }

    async fn list_active_macros(&self) -> AppResult<Vec<MacroRecord>> {
        match self {
            Self::Sqlite(db) => db.list_active_macros().await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.list_active_macros().await,
        }
    }

    async fn upsert_icon(&self, record: &IconRecord) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.upsert_icon(record).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.upsert_icon(record).await,
        }
    }

    async fn get_icon(&self, name: &str) -> AppResult<Option<IconRecord>> {
        match self {
            Self::Sqlite(db) => db.get_icon(name).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.get_icon(name).await,
        }
    }

    async fn upsert_policy(&self, policy: &SecurityPolicy) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.upsert_policy(policy).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.upsert_policy(policy).await,
        }
    }

    async fn list_active_policies(&self) -> AppResult<Vec<SecurityPolicy>> {
        match self {
            Self::Sqlite(db) => db.list_active_policies().await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.list_active_policies().await,
        }
    }

    async fn insert_execution_log(&self, entry: ExecutionLogInput) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.insert_execution_log(entry).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.insert_execution_log(entry).await,
        }
    }

    async fn get_last_failure(&self, tool_name: Option<&str>) -> AppResult<Option<ExecutionLog>> {
        match self {
            Self::Sqlite(db) => db.get_last_failure(tool_name).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.get_last_failure(tool_name).await,
        }
    }

    async fn get_notebook_entry(&self, domain: &str, key: &str) -> AppResult<Option<NotebookEntry>> {
        match self {
            Self::Sqlite(db) => db.get_notebook_entry(domain, key).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.get_notebook_entry(domain, key).await,
        }
    }

    async fn upsert_notebook_entry(
        &self,
        domain: &str,
        key: &str,
        value: &str,
        updated_by: &str,
    ) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.upsert_notebook_entry(domain, key, value, updated_by).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.upsert_notebook_entry(domain, key, value, updated_by).await,
        }
    }

    async fn append_notebook_history(&self, entry: NotebookHistoryEntry) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.append_notebook_history(entry).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.append_notebook_history(entry).await,
        }
    }

    async fn list_notebook_history(&self, domain: &str, key: &str) -> AppResult<Vec<NotebookHistoryEntry>> {
        match self {
            Self::Sqlite(db) => db.list_notebook_history(domain, key).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSql(db) => db.list_notebook_history(domain, key).await,
        }
    }
}
