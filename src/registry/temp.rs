// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local, in-memory shadow registries for temporary tools and
//! resources (`spec.md §3` "Temporary (in-memory) variants", §4.8
//! `create_temp_tool`/`create_temp_resource`).
//!
//! Backed by `DashMap` for the fine-grained concurrent mutation `spec.md §5`
//! requires, rather than a single `Mutex`/`RwLock` around a `HashMap`.

use super::models::{ResourceRecord, ToolRecord};
use dashmap::DashMap;

/// Composite key `(name, persona)` used by both temp tools and resources.
pub type RecordKey = (String, String);

#[derive(Debug, Default)]
pub struct TempRegistry {
    tools: DashMap<RecordKey, ToolRecord>,
    resources: DashMap<RecordKey, ResourceRecord>,
}

impl TempRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_tool(&self, record: ToolRecord) {
        self.tools
            .insert((record.name.clone(), record.persona.clone()), record);
    }

    #[must_use]
    pub fn get_tool(&self, name: &str, persona: &str) -> Option<ToolRecord> {
        self.tools
            .get(&(name.to_owned(), persona.to_owned()))
            .map(|r| r.clone())
    }

    #[must_use]
    pub fn list_tools_for_persona(&self, persona: &str) -> Vec<ToolRecord> {
        let mut out: Vec<ToolRecord> = self
            .tools
            .iter()
            .filter(|entry| entry.value().persona == persona)
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| (a.group.as_str(), a.name.as_str()).cmp(&(b.group.as_str(), b.name.as_str())));
        out
    }

    pub fn put_resource(&self, record: ResourceRecord) {
        self.resources
            .insert((record.name.clone(), record.persona.clone()), record);
    }

    #[must_use]
    pub fn get_resource(&self, uri_or_name: &str, persona: &str) -> Option<ResourceRecord> {
        self.resources
            .get(&(uri_or_name.to_owned(), persona.to_owned()))
            .map(|r| r.clone())
    }

    #[must_use]
    pub fn list_resources_for_persona(&self, persona: &str) -> Vec<ResourceRecord> {
        let mut out: Vec<ResourceRecord> = self
            .resources
            .iter()
            .filter(|entry| entry.value().persona == persona)
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| (a.group.as_str(), a.name.as_str()).cmp(&(b.group.as_str(), b.name.as_str())));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::models::ToolState;

    fn sample_tool(name: &str, persona: &str, group: &str) -> ToolRecord {
        ToolRecord {
            name: name.to_owned(),
            persona: persona.to_owned(),
            description: String::new(),
            input_schema: serde_json::json!({}),
            artifact_digest: "deadbeef".to_owned(),
            is_auto_created: true,
            group: group.to_owned(),
            manual: None,
            state: ToolState::Created,
        }
    }

    #[test]
    fn lists_are_scoped_by_persona_and_ordered() {
        let reg = TempRegistry::new();
        reg.put_tool(sample_tool("b_tool", "default", "z"));
        reg.put_tool(sample_tool("a_tool", "default", "a"));
        reg.put_tool(sample_tool("other", "other-persona", "a"));

        let listed = reg.list_tools_for_persona("default");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "a_tool");
        assert_eq!(listed[1].name, "b_tool");
    }
}
