// SPDX-License-Identifier: MIT OR Apache-2.0

//! C9 — Notebook: append-only key/value memory scoped by `domain`, with a
//! full change history. Used by the `self_correction` domain to record
//! tool failures, and exposed more generally as agent-writable memory.

use crate::database::DatabaseProvider;
use crate::errors::AppResult;
use crate::registry::models::{NotebookEntry, NotebookHistoryEntry};

/// Upsert `(domain, key)` to `value`, recording the prior value (if any) in
/// the history table. The history append and the entry upsert both commit
/// even when the entry did not previously exist (`old_value = None`).
pub async fn append(
    db: &impl DatabaseProvider,
    domain: &str,
    key: &str,
    value: &str,
    updated_by: &str,
) -> AppResult<()> {
    let previous = db.get_notebook_entry(domain, key).await?;
    db.upsert_notebook_entry(domain, key, value, updated_by).await?;
    db.append_notebook_history(NotebookHistoryEntry {
        domain: domain.to_owned(),
        key: key.to_owned(),
        old_value: previous.map(|e| e.value),
        new_value: value.to_owned(),
        changed_at: chrono::Utc::now(),
        changed_by: updated_by.to_owned(),
    })
    .await
}

pub async fn get(db: &impl DatabaseProvider, domain: &str, key: &str) -> AppResult<Option<NotebookEntry>> {
    db.get_notebook_entry(domain, key).await
}

pub async fn history(
    db: &impl DatabaseProvider,
    domain: &str,
    key: &str,
) -> AppResult<Vec<NotebookHistoryEntry>> {
    db.list_notebook_history(domain, key).await
}
