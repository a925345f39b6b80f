//! Outcome of a successfully dispatched tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tool_call::ToolName;

/// What a handler reports back after its side effect succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool: ToolName,
    /// Message shown to the client as the turn's final response.
    pub message: String,
    /// Structured result forwarded in the `tool_result` event.
    pub data: Value,
}

impl ToolOutcome {
    pub fn new(tool: ToolName, message: impl Into<String>, data: Value) -> Self {
        Self {
            tool,
            message: message.into(),
            data,
        }
    }
}
