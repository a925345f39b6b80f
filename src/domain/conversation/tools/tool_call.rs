//! Tool names and tool call value objects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Sentinel that opens a tool invocation in model output.
pub const TOOL_CALL_SENTINEL: &str = "TOOL_CALL:";

/// Sentinel that introduces the JSON parameter block.
pub const PARAMETERS_SENTINEL: &str = "PARAMETERS:";

/// The closed set of actions the model may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ShowContactForm,
    CreateMatter,
    RequestLawyerReview,
    AnalyzeDocument,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::ShowContactForm,
        ToolName::CreateMatter,
        ToolName::RequestLawyerReview,
        ToolName::AnalyzeDocument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ShowContactForm => "show_contact_form",
            ToolName::CreateMatter => "create_matter",
            ToolName::RequestLawyerReview => "request_lawyer_review",
            ToolName::AnalyzeDocument => "analyze_document",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a name is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool '{0}'")]
pub struct UnknownToolName(pub String);

impl FromStr for ToolName {
    type Err = UnknownToolName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| UnknownToolName(s.to_string()))
    }
}

/// A request to invoke a tool, with the operational (unmasked) parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    name: ToolName,
    parameters: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: ToolName, parameters: Map<String, Value>) -> Self {
        Self { name, parameters }
    }

    pub fn name(&self) -> ToolName {
        self.name
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Trimmed string parameter, `None` if absent, blank, or not a string.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Renders the call in the sentinel grammar the model is taught.
    pub fn render(&self, multiline: bool) -> String {
        let params = Value::Object(self.parameters.clone());
        let json = if multiline {
            serde_json::to_string_pretty(&params)
        } else {
            serde_json::to_string(&params)
        }
        .unwrap_or_else(|_| "{}".to_string());
        format!(
            "{} {}\n{} {}",
            TOOL_CALL_SENTINEL, self.name, PARAMETERS_SENTINEL, json
        )
    }
}
