// SPDX-License-Identifier: MIT OR Apache-2.0

//! `execute_workflow` (`spec.md §4.8`): the meta-tool surface over C10 — a
//! client supplies a plan, the Dispatcher validates and runs it.

use crate::chain::{execute_chain, validate_dag, ChainReport, Step};
use crate::dispatcher::Dispatcher;
use crate::errors::{AppError, AppResult, EngineError};
use std::sync::Arc;

pub async fn execute_workflow(dispatcher: &Arc<Dispatcher>, persona: &str, steps: Vec<Step>) -> AppResult<ChainReport> {
    validate_dag(&steps).map_err(AppError::from)?;

    let persona = persona.to_owned();
    let dispatcher = Arc::clone(dispatcher);
    let report = execute_chain(&steps, move |tool, args| {
        let dispatcher = Arc::clone(&dispatcher);
        let persona = persona.clone();
        async move {
            dispatcher
                .call_tool(&tool, &persona, args)
                .await
                .map_err(|e| EngineError::InvalidInput(format!("step tool '{tool}' failed: {}", e.internal_details())))
        }
    })
    .await;
    Ok(report)
}
