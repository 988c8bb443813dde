// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite backend for [`super::DatabaseProvider`]. Schema is created with
//! plain `CREATE TABLE IF NOT EXISTS` statements issued from Rust rather than
//! a migration-file toolchain, matching the upstream codebase's
//! `database/*.rs` convention (no `migrations/` directory anywhere in it).

use super::{DatabaseProvider, ExecutionLogInput};
use crate::artifact::{compute_digest, Artifact, ArtifactKind};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::registry::models::{
    ExecutionLog, ExecutionStatus, IconFormat, IconRecord, MacroRecord, NotebookEntry,
    NotebookHistoryEntry, PromptArgument, PromptRecord, ResourceRecord, RuleCategory, RuleType,
    SecurityPolicy, ToolManual, ToolRecord, ToolState,
};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| AppError::new(ErrorCode::DatabaseError, e.to_string()))?;
        Ok(Self { pool })
    }

    fn row_to_tool(row: &SqliteRow) -> AppResult<ToolRecord> {
        let manual_json: Option<String> = row.try_get("manual").ok();
        let manual = manual_json
            .and_then(|s| serde_json::from_str::<ToolManual>(&s).ok());
        let schema_json: String = row
            .try_get("input_schema")
            .map_err(|e| AppError::new(ErrorCode::DatabaseError, e.to_string()))?;
        let state_str: String = row
            .try_get("state")
            .map_err(|e| AppError::new(ErrorCode::DatabaseError, e.to_string()))?;
        Ok(ToolRecord {
            name: row.try_get("name").map_err(db_err)?,
            persona: row.try_get("persona").map_err(db_err)?,
            description: row.try_get("description").map_err(db_err)?,
            input_schema: serde_json::from_str(&schema_json).unwrap_or(serde_json::Value::Null),
            artifact_digest: row.try_get("artifact_digest").map_err(db_err)?,
            is_auto_created: row.try_get::<i64, _>("is_auto_created").map_err(db_err)? != 0,
            group: row.try_get("tool_group").map_err(db_err)?,
            manual,
            state: parse_tool_state(&state_str),
        })
    }

    fn row_to_resource(row: &SqliteRow) -> AppResult<ResourceRecord> {
        Ok(ResourceRecord {
            uri: row.try_get("uri").map_err(db_err)?,
            persona: row.try_get("persona").map_err(db_err)?,
            name: row.try_get("name").map_err(db_err)?,
            description: row.try_get("description").map_err(db_err)?,
            mime_type: row.try_get("mime_type").map_err(db_err)?,
            is_dynamic: row.try_get::<i64, _>("is_dynamic").map_err(db_err)? != 0,
            static_body: row.try_get("static_body").map_err(db_err)?,
            artifact_digest: row.try_get("artifact_digest").map_err(db_err)?,
            group: row.try_get("resource_group").map_err(db_err)?,
        })
    }

    fn row_to_prompt(row: &SqliteRow) -> AppResult<PromptRecord> {
        let args_json: String = row.try_get("arguments_schema").map_err(db_err)?;
        let arguments_schema: Vec<PromptArgument> =
            serde_json::from_str(&args_json).unwrap_or_default();
        Ok(PromptRecord {
            name: row.try_get("name").map_err(db_err)?,
            persona: row.try_get("persona").map_err(db_err)?,
            description: row.try_get("description").map_err(db_err)?,
            template: row.try_get("template").map_err(db_err)?,
            arguments_schema,
            group: row.try_get("prompt_group").map_err(db_err)?,
        })
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::new(ErrorCode::DatabaseError, e.to_string())
}

fn parse_tool_state(s: &str) -> ToolState {
    match s {
        "verified" => ToolState::Verified,
        "updated" => ToolState::Updated,
        "removed" => ToolState::Removed,
        _ => ToolState::Created,
    }
}

fn tool_state_str(s: ToolState) -> &'static str {
    match s {
        ToolState::Created => "created",
        ToolState::Verified => "verified",
        ToolState::Updated => "updated",
        ToolState::Removed => "removed",
    }
}

#[async_trait]
impl DatabaseProvider for SqliteDatabase {
    async fn migrate(&self) -> AppResult<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS artifacts (
                digest TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                kind TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS tools (
                name TEXT NOT NULL,
                persona TEXT NOT NULL,
                description TEXT NOT NULL,
                input_schema TEXT NOT NULL,
                artifact_digest TEXT NOT NULL,
                is_auto_created INTEGER NOT NULL DEFAULT 0,
                tool_group TEXT NOT NULL DEFAULT '',
                manual TEXT,
                state TEXT NOT NULL DEFAULT 'created',
                PRIMARY KEY (name, persona)
            )",
            "CREATE TABLE IF NOT EXISTS resources (
                uri TEXT NOT NULL,
                persona TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                is_dynamic INTEGER NOT NULL DEFAULT 0,
                static_body TEXT,
                artifact_digest TEXT,
                resource_group TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (uri, persona)
            )",
            "CREATE TABLE IF NOT EXISTS prompts (
                name TEXT NOT NULL,
                persona TEXT NOT NULL,
                description TEXT NOT NULL,
                template TEXT NOT NULL,
                arguments_schema TEXT NOT NULL DEFAULT '[]',
                prompt_group TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (name, persona)
            )",
            "CREATE TABLE IF NOT EXISTS macros (
                name TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                template TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            )",
            "CREATE TABLE IF NOT EXISTS icons (
                name TEXT PRIMARY KEY,
                format TEXT NOT NULL,
                body_base64 TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS security_policies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                rule_type TEXT NOT NULL,
                category TEXT NOT NULL,
                pattern TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                description TEXT NOT NULL DEFAULT ''
            )",
            "CREATE TABLE IF NOT EXISTS execution_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                tool_name TEXT NOT NULL,
                persona TEXT NOT NULL,
                arguments TEXT NOT NULL,
                status TEXT NOT NULL,
                result_summary TEXT NOT NULL,
                error_traceback TEXT
            )",
            "CREATE TABLE IF NOT EXISTS notebook_entries (
                domain TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                updated_by TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (domain, key)
            )",
            "CREATE TABLE IF NOT EXISTS notebook_history (
                domain TEXT NOT NULL,
                key TEXT NOT NULL,
                old_value TEXT,
                new_value TEXT NOT NULL,
                changed_at TEXT NOT NULL,
                changed_by TEXT NOT NULL
            )",
        ];

        for stmt in statements {
            sqlx::query(stmt).execute(&self.pool).await.map_err(db_err)?;
        }
        Ok(())
    }

    async fn put_artifact(&self, body: &str, kind: ArtifactKind) -> AppResult<String> {
        let digest = compute_digest(body);
        sqlx::query("INSERT OR IGNORE INTO artifacts (digest, body, kind) VALUES (?, ?, ?)")
            .bind(&digest)
            .bind(body)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(digest)
    }

    async fn get_artifact(&self, digest: &str) -> AppResult<Option<Artifact>> {
        let row = sqlx::query("SELECT digest, body, kind FROM artifacts WHERE digest = ?")
            .bind(digest)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            None => Ok(None),
            Some(row) => {
                let kind_str: String = row.try_get("kind").map_err(db_err)?;
                let kind = ArtifactKind::parse(&kind_str).ok_or_else(|| {
                    AppError::new(ErrorCode::DatabaseError, "unknown artifact kind in store")
                })?;
                Ok(Some(Artifact {
                    digest: row.try_get("digest").map_err(db_err)?,
                    body: row.try_get("body").map_err(db_err)?,
                    kind,
                }))
            }
        }
    }

    async fn upsert_tool(&self, record: &ToolRecord) -> AppResult<()> {
        if self.get_artifact(&record.artifact_digest).await?.is_none() {
            return Err(AppError::new(
                ErrorCode::ArtifactMissing,
                format!("artifact '{}' does not exist", record.artifact_digest),
            ));
        }
        let manual_json = record
            .manual
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_default());
        let schema_json = serde_json::to_string(&record.input_schema).unwrap_or_default();
        sqlx::query(
            "INSERT INTO tools (name, persona, description, input_schema, artifact_digest,
                is_auto_created, tool_group, manual, state)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(name, persona) DO UPDATE SET
                description = excluded.description,
                input_schema = excluded.input_schema,
                artifact_digest = excluded.artifact_digest,
                is_auto_created = excluded.is_auto_created,
                tool_group = excluded.tool_group,
                manual = excluded.manual,
                state = excluded.state",
        )
        .bind(&record.name)
        .bind(&record.persona)
        .bind(&record.description)
        .bind(&schema_json)
        .bind(&record.artifact_digest)
        .bind(i64::from(record.is_auto_created))
        .bind(&record.group)
        .bind(manual_json)
        .bind(tool_state_str(record.state))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_tool(&self, name: &str, persona: &str) -> AppResult<Option<ToolRecord>> {
        let row = sqlx::query("SELECT * FROM tools WHERE name = ? AND persona = ?")
            .bind(name)
            .bind(persona)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(Self::row_to_tool).transpose()
    }

    async fn list_tools(&self, persona: &str) -> AppResult<Vec<ToolRecord>> {
        let rows = sqlx::query("SELECT * FROM tools WHERE persona = ? ORDER BY tool_group, name")
            .bind(persona)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_tool).collect()
    }

    async fn delete_tool(&self, name: &str, persona: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM tools WHERE name = ? AND persona = ?")
            .bind(name)
            .bind(persona)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn upsert_resource(&self, record: &ResourceRecord) -> AppResult<()> {
        if !record.validate_dual_field() {
            return Err(AppError::new(
                ErrorCode::InvalidInput,
                "resource must have exactly one of static_body/artifact_digest",
            ));
        }
        sqlx::query(
            "INSERT INTO resources (uri, persona, name, description, mime_type, is_dynamic,
                static_body, artifact_digest, resource_group)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(uri, persona) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                mime_type = excluded.mime_type,
                is_dynamic = excluded.is_dynamic,
                static_body = excluded.static_body,
                artifact_digest = excluded.artifact_digest,
                resource_group = excluded.resource_group",
        )
        .bind(&record.uri)
        .bind(&record.persona)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.mime_type)
        .bind(i64::from(record.is_dynamic))
        .bind(&record.static_body)
        .bind(&record.artifact_digest)
        .bind(&record.group)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_resource(&self, uri: &str, persona: &str) -> AppResult<Option<ResourceRecord>> {
        let row = sqlx::query("SELECT * FROM resources WHERE uri = ? AND persona = ?")
            .bind(uri)
            .bind(persona)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(Self::row_to_resource).transpose()
    }

    async fn list_resources(&self, persona: &str) -> AppResult<Vec<ResourceRecord>> {
        let rows = sqlx::query("SELECT * FROM resources WHERE persona = ? ORDER BY resource_group, name")
            .bind(persona)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_resource).collect()
    }

    async fn upsert_prompt(&self, record: &PromptRecord) -> AppResult<()> {
        let args_json = serde_json::to_string(&record.arguments_schema).unwrap_or_default();
        sqlx::query(
            "INSERT INTO prompts (name, persona, description, template, arguments_schema, prompt_group)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(name, persona) DO UPDATE SET
                description = excluded.description,
                template = excluded.template,
                arguments_schema = excluded.arguments_schema,
                prompt_group = excluded.prompt_group",
        )
        .bind(&record.name)
        .bind(&record.persona)
        .bind(&record.description)
        .bind(&record.template)
        .bind(args_json)
        .bind(&record.group)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_prompt(&self, name: &str, persona: &str) -> AppResult<Option<PromptRecord>> {
        let row = sqlx::query("SELECT * FROM prompts WHERE name = ? AND persona = ?")
            .bind(name)
            .bind(persona)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(Self::row_to_prompt).transpose()
    }

    async fn list_prompts(&self, persona: &str) -> AppResult<Vec<PromptRecord>> {
        let rows = sqlx::query("SELECT * FROM prompts WHERE persona = ? ORDER BY prompt_group, name")
            .bind(persona)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_prompt).collect()
    }

    async fn upsert_macro(&self, record: &MacroRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO macros (name, description, template, is_active) VALUES (?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                description = excluded.description,
                template = excluded.template,
                is_active = excluded.is_active",
        )
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.template)
        .bind(i64::from(record.is_active))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_active_macros(&self) -> AppResult<Vec<MacroRecord>> {
        let rows = sqlx::query("SELECT name, description, template, is_active FROM macros WHERE is_active = 1 ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok(MacroRecord {
                    name: row.try_get("name").map_err(db_err)?,
                    description: row.try_get("description").map_err(db_err)?,
                    template: row.try_get("template").map_err(db_err)?,
                    is_active: row.try_get::<i64, _>("is_active").map_err(db_err)? != 0,
                })
            })
            .collect()
    }

    async fn upsert_icon(&self, record: &IconRecord) -> AppResult<()> {
        let format = match record.format {
            IconFormat::Svg => "svg",
            IconFormat::Png => "png",
        };
        sqlx::query(
            "INSERT INTO icons (name, format, body_base64) VALUES (?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET format = excluded.format, body_base64 = excluded.body_base64",
        )
        .bind(&record.name)
        .bind(format)
        .bind(&record.body_base64)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_icon(&self, name: &str) -> AppResult<Option<IconRecord>> {
        let row = sqlx::query("SELECT name, format, body_base64 FROM icons WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            None => Ok(None),
            Some(row) => {
                let format_str: String = row.try_get("format").map_err(db_err)?;
                let format = match format_str.as_str() {
                    "png" => IconFormat::Png,
                    _ => IconFormat::Svg,
                };
                Ok(Some(IconRecord {
                    name: row.try_get("name").map_err(db_err)?,
                    format,
                    body_base64: row.try_get("body_base64").map_err(db_err)?,
                }))
            }
        }
    }

    async fn upsert_policy(&self, policy: &SecurityPolicy) -> AppResult<()> {
        let rule_type = match policy.rule_type {
            RuleType::Allow => "allow",
            RuleType::Deny => "deny",
        };
        let category = match policy.category {
            RuleCategory::Module => "module",
            RuleCategory::Function => "function",
            RuleCategory::Attribute => "attribute",
        };
        sqlx::query(
            "INSERT INTO security_policies (rule_type, category, pattern, is_active, description)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(rule_type)
        .bind(category)
        .bind(&policy.pattern)
        .bind(i64::from(policy.is_active))
        .bind(&policy.description)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_active_policies(&self) -> AppResult<Vec<SecurityPolicy>> {
        let rows = sqlx::query(
            "SELECT id, rule_type, category, pattern, is_active, description
             FROM security_policies WHERE is_active = 1",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                let rule_type_str: String = row.try_get("rule_type").map_err(db_err)?;
                let category_str: String = row.try_get("category").map_err(db_err)?;
                Ok(SecurityPolicy {
                    id: row.try_get("id").map_err(db_err)?,
                    rule_type: if rule_type_str == "deny" {
                        RuleType::Deny
                    } else {
                        RuleType::Allow
                    },
                    category: match category_str.as_str() {
                        "function" => RuleCategory::Function,
                        "attribute" => RuleCategory::Attribute,
                        _ => RuleCategory::Module,
                    },
                    pattern: row.try_get("pattern").map_err(db_err)?,
                    is_active: row.try_get::<i64, _>("is_active").map_err(db_err)? != 0,
                    description: row.try_get("description").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn insert_execution_log(&self, entry: ExecutionLogInput) -> AppResult<()> {
        let status = match entry.status {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failure => "FAILURE",
        };
        let args_json = serde_json::to_string(&entry.arguments)
            .unwrap_or_else(|_| "\"<unserializable arguments>\"".to_owned());
        sqlx::query(
            "INSERT INTO execution_log (timestamp, tool_name, persona, arguments, status, result_summary, error_traceback)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&entry.tool_name)
        .bind(&entry.persona)
        .bind(args_json)
        .bind(status)
        .bind(&entry.result_summary)
        .bind(&entry.error_traceback)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_last_failure(&self, tool_name: Option<&str>) -> AppResult<Option<ExecutionLog>> {
        let row = if let Some(name) = tool_name {
            sqlx::query(
                "SELECT * FROM execution_log WHERE status = 'FAILURE' AND tool_name = ?
                 ORDER BY id DESC LIMIT 1",
            )
            .bind(name)
            .fetch_optional(&self.pool)
            .await
        } else {
            sqlx::query("SELECT * FROM execution_log WHERE status = 'FAILURE' ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await
        }
        .map_err(db_err)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let args_json: String = row.try_get("arguments").map_err(db_err)?;
                let ts_str: String = row.try_get("timestamp").map_err(db_err)?;
                Ok(Some(ExecutionLog {
                    id: row.try_get("id").map_err(db_err)?,
                    timestamp: chrono::DateTime::parse_from_rfc3339(&ts_str)
                        .map(|dt| dt.with_timezone(&chrono::Utc))
                        .unwrap_or_else(|_| chrono::Utc::now()),
                    tool_name: row.try_get("tool_name").map_err(db_err)?,
                    persona: row.try_get("persona").map_err(db_err)?,
                    arguments: serde_json::from_str(&args_json).unwrap_or(serde_json::Value::Null),
                    status: ExecutionStatus::Failure,
                    result_summary: row.try_get("result_summary").map_err(db_err)?,
                    error_traceback: row.try_get("error_traceback").map_err(db_err)?,
                }))
            }
        }
    }

    async fn get_notebook_entry(&self, domain: &str, key: &str) -> AppResult<Option<NotebookEntry>> {
        let row = sqlx::query("SELECT * FROM notebook_entries WHERE domain = ? AND key = ?")
            .bind(domain)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            None => Ok(None),
            Some(row) => {
                let created: String = row.try_get("created_at").map_err(db_err)?;
                let updated: String = row.try_get("updated_at").map_err(db_err)?;
                Ok(Some(NotebookEntry {
                    domain: row.try_get("domain").map_err(db_err)?,
                    key: row.try_get("key").map_err(db_err)?,
                    value: row.try_get("value").map_err(db_err)?,
                    created_at: parse_rfc3339(&created),
                    updated_at: parse_rfc3339(&updated),
                    updated_by: row.try_get("updated_by").map_err(db_err)?,
                    is_active: row.try_get::<i64, _>("is_active").map_err(db_err)? != 0,
                }))
            }
        }
    }

    async fn upsert_notebook_entry(
        &self,
        domain: &str,
        key: &str,
        value: &str,
        updated_by: &str,
    ) -> AppResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO notebook_entries (domain, key, value, created_at, updated_at, updated_by, is_active)
             VALUES (?, ?, ?, ?, ?, ?, 1)
             ON CONFLICT(domain, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by,
                is_active = 1",
        )
        .bind(domain)
        .bind(key)
        .bind(value)
        .bind(&now)
        .bind(&now)
        .bind(updated_by)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn append_notebook_history(&self, entry: NotebookHistoryEntry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO notebook_history (domain, key, old_value, new_value, changed_at, changed_by)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.domain)
        .bind(&entry.key)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(entry.changed_at.to_rfc3339())
        .bind(&entry.changed_by)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_notebook_history(&self, domain: &str, key: &str) -> AppResult<Vec<NotebookHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT domain, key, old_value, new_value, changed_at, changed_by
             FROM notebook_history WHERE domain = ? AND key = ? ORDER BY changed_at ASC",
        )
        .bind(domain)
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                let changed_at: String = row.try_get("changed_at").map_err(db_err)?;
                Ok(NotebookHistoryEntry {
                    domain: row.try_get("domain").map_err(db_err)?,
                    key: row.try_get("key").map_err(db_err)?,
                    old_value: row.try_get("old_value").map_err(db_err)?,
                    new_value: row.try_get("new_value").map_err(db_err)?,
                    changed_at: parse_rfc3339(&changed_at),
                    changed_by: row.try_get("changed_by").map_err(db_err)?,
                })
            })
            .collect()
    }
}

fn parse_rfc3339(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn in_memory() -> SqliteDatabase {
        let db = SqliteDatabase::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn put_artifact_is_idempotent() {
        let db = in_memory().await;
        let d1 = db.put_artifact("SELECT 1", ArtifactKind::Select).await.unwrap();
        let d2 = db.put_artifact("SELECT 1", ArtifactKind::Select).await.unwrap();
        assert_eq!(d1, d2);
        let fetched = db.get_artifact(&d1).await.unwrap().unwrap();
        assert_eq!(fetched.body, "SELECT 1");
    }

    #[tokio::test]
    async fn upsert_tool_requires_existing_artifact() {
        let db = in_memory().await;
        let record = ToolRecord {
            name: "greet".into(),
            persona: "default".into(),
            description: "greets".into(),
            input_schema: serde_json::json!({}),
            artifact_digest: "missing-digest".into(),
            is_auto_created: false,
            group: "utility".into(),
            manual: None,
            state: ToolState::Created,
        };
        let err = db.upsert_tool(&record).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ArtifactMissing);
    }

    #[tokio::test]
    async fn tools_list_scoped_by_persona_and_ordered() {
        let db = in_memory().await;
        let digest = db.put_artifact("print('hi')", ArtifactKind::Script).await.unwrap();
        for (name, group) in [("b_tool", "z"), ("a_tool", "a")] {
            let record = ToolRecord {
                name: name.into(),
                persona: "default".into(),
                description: String::new(),
                input_schema: serde_json::json!({}),
                artifact_digest: digest.clone(),
                is_auto_created: true,
                group: group.into(),
                manual: None,
                state: ToolState::Created,
            };
            db.upsert_tool(&record).await.unwrap();
        }
        let listed = db.list_tools("default").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "a_tool");
    }
}
