// SPDX-License-Identifier: MIT OR Apache-2.0

//! C2 — Registry: typed CRUD over tools, resources, prompts, macros, icons,
//! and policies. The persistence of these operations lives on
//! [`crate::database::DatabaseProvider`]; this module owns the record shapes
//! (`models`) and the process-local temporary shadow registries (`temp`).

pub mod models;
pub mod temp;

pub use models::*;
pub use temp::TempRegistry;

/// Listing filter shared by `list_tools`/`list_resources`/`list_prompts`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub persona: Option<String>,
    pub group: Option<String>,
}

impl ListFilter {
    #[must_use]
    pub fn by_persona(persona: impl Into<String>) -> Self {
        Self {
            persona: Some(persona.into()),
            group: None,
        }
    }
}

/// Sort tool/resource/prompt-like records by `(group, name)`, the ordering
/// contract `spec.md §4.5` makes observable.
pub fn sort_by_group_then_name<T>(items: &mut [T], group: impl Fn(&T) -> &str, name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| (group(a), name(a)).cmp(&(group(b), name(b))));
}
