// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crate-wide error taxonomy.
//!
//! `ErrorCode` is a stable, serializable classification used for client-facing
//! responses and metrics; `AppError` pairs a code with a human message and an
//! optional request id. `EngineError` is the richer, structured error type
//! produced by the dispatch/validation/execution/chain components; it converts
//! into `AppError` at the boundary where a result crosses back out to an MCP
//! client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable classification of an error, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ToolNotFound,
    ArtifactMissing,
    ArtifactCorrupt,
    InvalidStructure,
    NotReadOnly,
    MultipleStatements,
    PolicyViolation,
    DataBackendUnavailable,
    MissingArgument,
    DuplicateStepId,
    ForwardReference,
    FieldNotFound,
    AmbiguousToolClass,
    NoToolClass,
    ScriptRuntimeError,
    InvalidInput,
    ResourceNotFound,
    ResourceAlreadyExists,
    ConfigError,
    InternalError,
    DatabaseError,
}

impl ErrorCode {
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ToolNotFound => "no tool matches the requested name and persona",
            Self::ArtifactMissing => "the referenced artifact does not exist in the store",
            Self::ArtifactCorrupt => "the stored artifact's digest does not match its body",
            Self::InvalidStructure => "script body violates the top-level structural contract",
            Self::NotReadOnly => "statement contains a non-read keyword",
            Self::MultipleStatements => "statement contains more than one terminated clause",
            Self::PolicyViolation => "a deny policy matched the artifact",
            Self::DataBackendUnavailable => "the data session is not connected",
            Self::MissingArgument => "a required argument or placeholder is absent",
            Self::DuplicateStepId => "two chain steps share the same id",
            Self::ForwardReference => "a chain step references an id not yet executed",
            Self::FieldNotFound => "a substitution path does not resolve in the referenced result",
            Self::AmbiguousToolClass => "more than one Tool subclass was found in the script",
            Self::NoToolClass => "no Tool subclass was found in the script",
            Self::ScriptRuntimeError => "the script raised an error while running",
            Self::InvalidInput => "input failed validation",
            Self::ResourceNotFound => "the requested resource does not exist",
            Self::ResourceAlreadyExists => "a resource with this key already exists",
            Self::ConfigError => "configuration is missing or invalid",
            Self::InternalError => "an unexpected internal error occurred",
            Self::DatabaseError => "a database operation failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A crate-wide error carrying a stable code, a message, and an optional
/// request id for correlating with logs.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: None,
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Message safe to return to an MCP client: passes through for
    /// validation-shaped codes, generic otherwise.
    #[must_use]
    pub fn sanitized_message(&self) -> String {
        match self.code {
            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                "an internal error occurred".to_owned()
            }
            _ => self.message.clone(),
        }
    }

    /// Full detail, suitable only for logs and the audit trail.
    #[must_use]
    pub fn internal_details(&self) -> String {
        format!("{}: {}", self.code, self.message)
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }
}

/// Structured errors raised by the dispatch/validation/execution/chain
/// components (`spec.md §7`). Each variant carries the fields the spec
/// names so callers can render a precise diagnostic.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("no tool named '{name}' for persona '{persona}'")]
    ToolNotFound { name: String, persona: String },

    #[error("artifact '{digest}' referenced by '{referrer}' is missing")]
    ArtifactMissing { digest: String, referrer: String },

    #[error("artifact '{digest}' failed integrity check")]
    ArtifactCorrupt { digest: String },

    #[error("invalid script structure: {reason}")]
    InvalidStructure { reason: String },

    #[error("statement is not read-only: forbidden keyword '{keyword}'")]
    NotReadOnly { keyword: String },

    #[error("statement contains more than one clause")]
    MultipleStatements,

    #[error("policy violation: category={category} pattern={pattern}")]
    PolicyViolation { category: String, pattern: String },

    #[error("data backend unavailable")]
    DataBackendUnavailable,

    #[error("missing argument or placeholder '{name}'")]
    MissingArgument { name: String },

    #[error("duplicate step id '{id}'")]
    DuplicateStepId { id: String },

    #[error("step {step_index} ('{step_id}') refers to unknown or later id '{referent}'")]
    ForwardReference {
        step_index: usize,
        step_id: String,
        referent: String,
    },

    #[error("path '{path}' not found in result of step '{step_id}'")]
    FieldNotFound { step_id: String, path: String },

    #[error("{count} Tool subclasses found in script, expected exactly one")]
    AmbiguousToolClass { count: usize },

    #[error("no Tool subclass found in script")]
    NoToolClass,

    #[error("script error in '{tool_name}': {traceback}")]
    ScriptRuntimeError {
        tool_name: String,
        traceback: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let code = match &err {
            EngineError::ToolNotFound { .. } => ErrorCode::ToolNotFound,
            EngineError::ArtifactMissing { .. } => ErrorCode::ArtifactMissing,
            EngineError::ArtifactCorrupt { .. } => ErrorCode::ArtifactCorrupt,
            EngineError::InvalidStructure { .. } => ErrorCode::InvalidStructure,
            EngineError::NotReadOnly { .. } => ErrorCode::NotReadOnly,
            EngineError::MultipleStatements => ErrorCode::MultipleStatements,
            EngineError::PolicyViolation { .. } => ErrorCode::PolicyViolation,
            EngineError::DataBackendUnavailable => ErrorCode::DataBackendUnavailable,
            EngineError::MissingArgument { .. } => ErrorCode::MissingArgument,
            EngineError::DuplicateStepId { .. } => ErrorCode::DuplicateStepId,
            EngineError::ForwardReference { .. } => ErrorCode::ForwardReference,
            EngineError::FieldNotFound { .. } => ErrorCode::FieldNotFound,
            EngineError::AmbiguousToolClass { .. } => ErrorCode::AmbiguousToolClass,
            EngineError::NoToolClass => ErrorCode::NoToolClass,
            EngineError::ScriptRuntimeError { .. } => ErrorCode::ScriptRuntimeError,
            EngineError::InvalidInput(_) => ErrorCode::InvalidInput,
            EngineError::Database(_) => ErrorCode::DatabaseError,
        };
        Self::new(code, err.to_string())
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}
