//! Intake tools the model can invoke through the sentinel grammar.
//!
//! ## Key Types
//!
//! - [`ToolName`] - The closed set of tool names
//! - [`ToolCall`] - A tool name plus its operational parameters
//! - [`ToolDefinition`] - Typed parameter schema for one tool
//! - [`ToolRegistry`] - Immutable name to definition mapping
//! - [`ToolCallParser`] - Finds and validates a tool call in model output
//! - [`ToolOutcome`] - What a handler reports after succeeding

mod parser;
mod pii;
mod tool_call;
mod tool_definition;
mod tool_registry;
mod tool_result;

pub use parser::{ParsedToolCall, ToolCallParser, ToolParseError};
pub use pii::{mask_email, mask_name, mask_parameters, mask_phone};
pub use tool_call::{ToolCall, ToolName, UnknownToolName, PARAMETERS_SENTINEL, TOOL_CALL_SENTINEL};
pub use tool_definition::{
    canonical_matter_type, ParameterError, ParameterKind, ParameterSpec, ToolDefinition,
    ANALYSIS_TYPES, MATTER_TYPES, URGENCY_LEVELS,
};
pub use tool_registry::ToolRegistry;
pub use tool_result::ToolOutcome;
