// SPDX-License-Identifier: MIT OR Apache-2.0

//! C8 — Meta-Tools: the privileged, well-known tool set that mutates the
//! Registry (and, for the write-capable SQL tools, the data store). These
//! are ordinary tools from the Dispatcher's point of view — their failures
//! flow through the same audit/notebook path as any other call
//! (`spec.md §7` propagation policy).

pub mod db_ops;
pub mod manual;
pub mod registry_tools;
pub mod workflow;

pub use db_ops::{execute_ddl_tool, general_merge_tool, get_last_error, reconnect_db, test_db_connection};
pub use manual::{system_inspect_tool, system_update_manual, system_verify_tool, ManualUpdateMode};
pub use registry_tools::{
    create_dashboard, create_new_prompt, create_new_resource, create_new_sql_tool, create_temp_resource,
    create_temp_tool, register_macro, remove_tool,
};
pub use workflow::execute_workflow;
