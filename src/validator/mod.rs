// SPDX-License-Identifier: MIT OR Apache-2.0

//! C3 — Validator: structural checks on imperative artifacts and SQL
//! artifacts.

pub mod policy;
pub mod script;
pub mod sql;

pub use policy::EffectivePolicy;
pub use script::{analyze, validate_script, ScriptReport, Violation};
pub use sql::{validate_ddl, validate_sql};
