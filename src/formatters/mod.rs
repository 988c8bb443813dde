// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output format abstraction for `call_tool` results (`spec.md §6`'s
//! `_format ∈ {json, toon}` hint).

use serde::Serialize;
use std::fmt;

/// Rendering format requested for a dispatched call's result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Toon,
}

impl OutputFormat {
    #[must_use]
    pub fn from_str_param(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "toon" => Self::Toon,
            _ => Self::Json,
        }
    }

    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Toon => "application/vnd.toon",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toon => "toon",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct FormattedOutput {
    pub data: String,
    pub format: OutputFormat,
    pub content_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct FormatError {
    pub message: String,
    pub format: OutputFormat,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to format as {}: {}", self.format, self.message)
    }
}

impl std::error::Error for FormatError {}

pub fn format_output<T: Serialize>(
    data: &T,
    format: OutputFormat,
) -> Result<FormattedOutput, FormatError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(data).map_err(|e| FormatError {
            message: e.to_string(),
            format,
        })?,
        OutputFormat::Toon => {
            #[cfg(feature = "toon")]
            {
                let value = serde_json::to_value(data).map_err(|e| FormatError {
                    message: e.to_string(),
                    format,
                })?;
                toon_format::encode(&value, &toon_format::EncodeOptions::default()).map_err(
                    |e| FormatError {
                        message: e.to_string(),
                        format,
                    },
                )?
            }
            #[cfg(not(feature = "toon"))]
            {
                return Err(FormatError {
                    message: "toon output format requires the `toon` feature".to_owned(),
                    format,
                });
            }
        }
    };

    Ok(FormattedOutput {
        data: rendered,
        format,
        content_type: format.content_type(),
    })
}

pub fn format_output_pretty<T: Serialize>(
    data: &T,
    format: OutputFormat,
) -> Result<FormattedOutput, FormatError> {
    match format {
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(data).map_err(|e| FormatError {
                message: e.to_string(),
                format,
            })?;
            Ok(FormattedOutput {
                data: rendered,
                format,
                content_type: format.content_type(),
            })
        }
        OutputFormat::Toon => format_output(data, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_json_on_unknown_param() {
        assert_eq!(OutputFormat::from_str_param("xml"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str_param("TOON"), OutputFormat::Toon);
    }

    #[test]
    fn formats_json() {
        let out = format_output(&serde_json::json!({"a": 1}), OutputFormat::Json).unwrap();
        assert_eq!(out.data, r#"{"a":1}"#);
    }
}
