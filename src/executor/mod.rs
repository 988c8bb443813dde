// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executors: C6 (SQL) renders and runs `select`-kind artifacts against the
//! opaque data session; C7 (Script) interprets `script`-kind artifacts in a
//! restricted namespace. Both are invoked exclusively by the Dispatcher (C5)
//! after C3 has already validated the artifact body.

pub mod script;
pub mod sql;

pub use script::{execute_script_tool, ExecContext, SubExecutorFn};
pub use sql::execute_sql_tool;
