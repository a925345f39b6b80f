//! Tool-call parser for the free-text sentinel grammar.
//!
//! The model is taught to write
//!
//! ```text
//! TOOL_CALL: <name>
//! PARAMETERS: <json object>
//! ```
//!
//! somewhere in its reply. The same pair written on one line
//! (`TOOL_CALL: <name> PARAMETERS: {...}`) is accepted anywhere in the text;
//! a bare `TOOL_CALL: <name>` mid-sentence is prose. No sentinel means the
//! reply is plain prose. A sentinel with a broken body is a typed error,
//! never a panic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use super::pii::mask_parameters;
use super::tool_call::ToolCall;
use super::tool_definition::ToolDefinition;
use super::tool_registry::ToolRegistry;
use crate::domain::conversation::extractor::slice_balanced_json;

/// Group 1: name of a sentinel alone on its line. Groups 2 and 3: name and
/// `PARAMETERS:` marker of the one-line form.
static SENTINEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?m)^[ \t>*_`]*TOOL_CALL:[ \t*_`]*([A-Za-z_][A-Za-z0-9_]*)[ \t*_`]*\r?$",
        r"|\bTOOL_CALL:[ \t*_`]*([A-Za-z_][A-Za-z0-9_]*)[ \t*_`]+(PARAMETERS:)",
    ))
    .expect("sentinel regex is valid")
});

static PARAMETERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t>*_`]*PARAMETERS:[ \t*_]*").expect("parameters regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolParseError {
    #[error("invalid JSON for tool '{tool}': {message}")]
    InvalidJson { tool: String, message: String },

    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("invalid parameters for tool '{tool}': {field} {reason}")]
    InvalidParameters {
        tool: String,
        field: String,
        reason: String,
    },
}

/// A tool call found in model output.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    /// Operational copy, passed to the handler.
    pub call: ToolCall,
    /// Prose the model wrote before the sentinel.
    pub preamble: String,
    /// PII-masked copy, for logs and events only.
    pub sanitized_parameters: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ToolCallParser {
    registry: Arc<ToolRegistry>,
}

impl ToolCallParser {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Extracts the tool call from model output.
    ///
    /// `Ok(None)` means no sentinel was present. When several sentinels are
    /// present the first that names a registered tool and carries valid
    /// parameters wins; if none does, the first failure is returned.
    pub fn parse(&self, output: &str) -> Result<Option<ParsedToolCall>, ToolParseError> {
        let mut first_error: Option<ToolParseError> = None;

        for caps in SENTINEL.captures_iter(output) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2)))
            else {
                continue;
            };
            let Some(definition) = self.registry.lookup(name.as_str()) else {
                first_error.get_or_insert_with(|| ToolParseError::UnknownTool {
                    name: name.as_str().to_string(),
                });
                continue;
            };

            // The one-line form hands its PARAMETERS: marker to the body reader.
            let body_start = caps.get(3).map(|m| m.start()).unwrap_or(whole.end());
            match self.parse_call(definition, &output[body_start..]) {
                Ok((call, sanitized_parameters)) => {
                    return Ok(Some(ParsedToolCall {
                        call,
                        preamble: clean_preamble(&output[..whole.start()]),
                        sanitized_parameters,
                    }));
                }
                Err(err) => {
                    tracing::debug!(error = %err, "Skipping unusable tool sentinel");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    fn parse_call(
        &self,
        definition: &ToolDefinition,
        body: &str,
    ) -> Result<(ToolCall, Map<String, Value>), ToolParseError> {
        let tool = definition.name();
        let raw = parameters_after(body).map_err(|message| ToolParseError::InvalidJson {
            tool: tool.to_string(),
            message,
        })?;

        let parameters =
            definition
                .validate(&raw)
                .map_err(|e| ToolParseError::InvalidParameters {
                    tool: tool.to_string(),
                    field: e.field,
                    reason: e.reason,
                })?;

        let sanitized_parameters = mask_parameters(&parameters);
        Ok((ToolCall::new(tool, parameters), sanitized_parameters))
    }
}

/// Reads the JSON object following `PARAMETERS:`, stopping before any later
/// sentinel. A missing `PARAMETERS:` line means an empty object.
fn parameters_after(text: &str) -> Result<Map<String, Value>, String> {
    let scope_end = SENTINEL.find(text).map(|m| m.start()).unwrap_or(text.len());
    let scope = &text[..scope_end];

    let Some(marker) = PARAMETERS.find(scope) else {
        return Ok(Map::new());
    };

    let body = skip_fence(&scope[marker.end()..]);
    let offset = body.len() - body.trim_start().len();
    let trimmed = &body[offset..];

    if !trimmed.starts_with('{') {
        return Err("expected a JSON object after PARAMETERS:".to_string());
    }
    let json = slice_balanced_json(trimmed, 0)
        .ok_or_else(|| "unterminated JSON object".to_string())?;

    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("parameters must be a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn skip_fence(text: &str) -> &str {
    let trimmed = text.trim_start();
    for fence in ["```json", "```"] {
        if let Some(rest) = trimmed.strip_prefix(fence) {
            return rest;
        }
    }
    text
}

fn clean_preamble(text: &str) -> String {
    let trimmed = text.trim_end();
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim().to_string()
}
