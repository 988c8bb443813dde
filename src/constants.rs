// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared numeric and string constants referenced across components.

/// Default persona used when a caller supplies none.
pub const DEFAULT_PERSONA: &str = "default";

/// Row cap applied by the SQL executor to temporary ("test") tools.
pub const TEMP_TOOL_ROW_LIMIT: i64 = 3;

/// Upper bound on `result_summary` length stored in the execution log.
pub const RESULT_SUMMARY_MAX_CHARS: usize = 2000;

/// Notebook domain reserved for the dispatcher's failure handler.
pub const SELF_CORRECTION_DOMAIN: &str = "self_correction";

/// MCP protocol versions this core understands, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2024-11-05"];
