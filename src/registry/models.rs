// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed record shapes owned by the Registry (C2), per `spec.md §3`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ManualExample {
    pub input: serde_json::Value,
    pub expected_summary: String,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolManual {
    pub usage_guide: Option<String>,
    pub examples: Vec<ManualExample>,
    pub pitfalls: Vec<String>,
    pub error_codes: Vec<String>,
}

/// State machine position for an auto-created tool (`spec.md §4.8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    Created,
    Verified,
    Updated,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecord {
    pub name: String,
    pub persona: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub artifact_digest: String,
    pub is_auto_created: bool,
    pub group: String,
    pub manual: Option<ToolManual>,
    pub state: ToolState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub uri: String,
    pub persona: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
    pub is_dynamic: bool,
    pub static_body: Option<String>,
    pub artifact_digest: Option<String>,
    pub group: String,
}

impl ResourceRecord {
    /// `spec.md §3` invariant: exactly one of `static_body`/`artifact_digest`.
    #[must_use]
    pub fn validate_dual_field(&self) -> bool {
        self.static_body.is_some() != self.artifact_digest.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRecord {
    pub name: String,
    pub persona: String,
    pub description: String,
    pub template: String,
    pub arguments_schema: Vec<PromptArgument>,
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroRecord {
    pub name: String,
    pub description: String,
    pub template: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconFormat {
    Svg,
    Png,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconRecord {
    pub name: String,
    pub format: IconFormat,
    pub body_base64: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Module,
    Function,
    Attribute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub id: i64,
    pub rule_type: RuleType,
    pub category: RuleCategory,
    pub pattern: String,
    pub is_active: bool,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: i64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub tool_name: String,
    pub persona: String,
    pub arguments: serde_json::Value,
    pub status: ExecutionStatus,
    pub result_summary: String,
    pub error_traceback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookEntry {
    pub domain: String,
    pub key: String,
    pub value: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub updated_by: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookHistoryEntry {
    pub domain: String,
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: String,
    pub changed_at: chrono::DateTime<chrono::Utc>,
    pub changed_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_record_enforces_xor() {
        let mut r = ResourceRecord {
            uri: "x".into(),
            persona: "default".into(),
            name: "x".into(),
            description: String::new(),
            mime_type: "text/plain".into(),
            is_dynamic: false,
            static_body: Some("body".into()),
            artifact_digest: None,
            group: String::new(),
        };
        assert!(r.validate_dual_field());
        r.artifact_digest = Some("abc".into());
        assert!(!r.validate_dual_field());
    }
}
