// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server configuration, loaded from environment variables with CLI overrides.
//!
//! Mirrors the upstream pattern of a single typed config struct built by
//! `from_env()` and then selectively overridden by parsed CLI args, rather
//! than threading raw environment lookups through the codebase.

use crate::errors::{AppError, AppResult, ErrorCode};
use std::collections::HashMap;
use std::path::PathBuf;

/// Transport the host process exposes the MCP protocol over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Sse,
}

impl Transport {
    fn parse(s: &str) -> AppResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "sse" => Ok(Self::Sse),
            other => Err(AppError::new(
                ErrorCode::ConfigError,
                format!("unrecognized transport '{other}', expected stdio|sse"),
            )),
        }
    }
}

/// Table-name mapping for enterprise deployments that rename or prefix the
/// registry's underlying tables (`spec.md §6`).
#[derive(Debug, Clone, Default)]
pub struct TableNames {
    pub schema_prefix: Option<String>,
    pub overrides: HashMap<String, String>,
}

impl TableNames {
    /// Resolve the physical table name for a logical entity name.
    #[must_use]
    pub fn resolve(&self, logical: &str) -> String {
        let base = self
            .overrides
            .get(logical)
            .cloned()
            .unwrap_or_else(|| logical.to_owned());
        match &self.schema_prefix {
            Some(prefix) => format!("{prefix}{base}"),
            None => base,
        }
    }
}

/// Top-level server configuration. Every field here corresponds to a
/// configuration input named in `spec.md §6` plus the ambient CLI fields
/// needed to make the binary runnable.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub metadata_url: String,
    pub data_url: Option<String>,
    pub dashboard_enabled: bool,
    pub dashboard_storage_dir: Option<PathBuf>,
    pub table_names: TableNames,
    pub log_level: String,
    pub logs_dir: Option<PathBuf>,
    pub transport: Transport,
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Build configuration from environment variables. Unrecognized keys
    /// prefixed `REGISTRY_MCP_` are rejected to satisfy spec.md's "any
    /// unrecognized key is a configuration error at startup" rule.
    pub fn from_env() -> AppResult<Self> {
        let known_suffixes = [
            "METADATA_URL",
            "DATA_URL",
            "DASHBOARD_ENABLED",
            "DASHBOARD_STORAGE_DIR",
            "SCHEMA_PREFIX",
            "LOG_LEVEL",
            "LOGS_DIR",
            "TRANSPORT",
            "HOST",
            "PORT",
        ];
        for (key, _) in std::env::vars() {
            if let Some(suffix) = key.strip_prefix("REGISTRY_MCP_") {
                if !known_suffixes.contains(&suffix) {
                    return Err(AppError::new(
                        ErrorCode::ConfigError,
                        format!("unrecognized configuration key REGISTRY_MCP_{suffix}"),
                    ));
                }
            }
        }

        let metadata_url = std::env::var("REGISTRY_MCP_METADATA_URL")
            .map_err(|_| AppError::new(ErrorCode::ConfigError, "REGISTRY_MCP_METADATA_URL is required"))?;
        let data_url = std::env::var("REGISTRY_MCP_DATA_URL").ok();
        let dashboard_enabled = std::env::var("REGISTRY_MCP_DASHBOARD_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let dashboard_storage_dir = std::env::var("REGISTRY_MCP_DASHBOARD_STORAGE_DIR")
            .ok()
            .map(PathBuf::from);
        let schema_prefix = std::env::var("REGISTRY_MCP_SCHEMA_PREFIX").ok();
        let log_level = std::env::var("REGISTRY_MCP_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
        let logs_dir = std::env::var("REGISTRY_MCP_LOGS_DIR").ok().map(PathBuf::from);
        let transport = std::env::var("REGISTRY_MCP_TRANSPORT")
            .ok()
            .map_or(Ok(Transport::Stdio), |v| Transport::parse(&v))?;
        let host = std::env::var("REGISTRY_MCP_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let port: u16 = std::env::var("REGISTRY_MCP_PORT")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .map_err(|_| AppError::new(ErrorCode::ConfigError, "REGISTRY_MCP_PORT is not a valid port"))?
            .unwrap_or(8585);

        Ok(Self {
            metadata_url,
            data_url,
            dashboard_enabled,
            dashboard_storage_dir,
            table_names: TableNames {
                schema_prefix,
                overrides: HashMap::new(),
            },
            log_level,
            logs_dir,
            transport,
            host,
            port,
        })
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "metadata_url=<redacted> data_url={} dashboard_enabled={} transport={:?} host={} port={}",
            self.data_url.as_ref().map_or("none", |_| "<redacted>"),
            self.dashboard_enabled,
            self.transport,
            self.host,
            self.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_resolves_with_prefix_and_override() {
        let mut overrides = HashMap::new();
        overrides.insert("tools".to_owned(), "tool_records".to_owned());
        let names = TableNames {
            schema_prefix: Some("acme_".to_owned()),
            overrides,
        };
        assert_eq!(names.resolve("tools"), "acme_tool_records");
        assert_eq!(names.resolve("resources"), "acme_resources");
    }

    #[test]
    fn transport_parse_rejects_unknown() {
        assert!(Transport::parse("carrier-pigeon").is_err());
        assert_eq!(Transport::parse("stdio").unwrap() == Transport::Stdio, true);
    }
}
