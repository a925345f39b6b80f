//! Events emitted to the client during one turn.
//!
//! On the wire each event is a `data: <json>` frame whose `type` field is the
//! discriminator. Consumers must tolerate types they do not know, so decoding
//! an unrecognised type yields [`AgentEvent::Unknown`] instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::state::ConversationState;
use super::tools::ToolName;
use crate::domain::foundation::CorrelationId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Connected {
        #[serde(rename = "correlationId")]
        correlation_id: CorrelationId,
    },
    Typing,
    Text {
        text: String,
    },
    /// Parameters are the PII-masked copy.
    ToolCall {
        name: ToolName,
        parameters: Map<String, Value>,
    },
    ToolResult {
        name: ToolName,
        result: Value,
        state: ConversationState,
    },
    /// Leaves the channel open when `allow_retry` is set.
    ToolError {
        name: ToolName,
        message: String,
        #[serde(rename = "allowRetry")]
        allow_retry: bool,
        #[serde(rename = "correlationId")]
        correlation_id: CorrelationId,
    },
    Final {
        response: String,
    },
    Error {
        message: String,
        #[serde(rename = "correlationId")]
        correlation_id: CorrelationId,
    },
    #[serde(other)]
    Unknown,
}

impl AgentEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            AgentEvent::Connected { .. } => "connected",
            AgentEvent::Typing => "typing",
            AgentEvent::Text { .. } => "text",
            AgentEvent::ToolCall { .. } => "tool_call",
            AgentEvent::ToolResult { .. } => "tool_result",
            AgentEvent::ToolError { .. } => "tool_error",
            AgentEvent::Final { .. } => "final",
            AgentEvent::Error { .. } => "error",
            AgentEvent::Unknown => "unknown",
        }
    }

    /// True for events that end the turn and close the channel.
    pub fn closes_channel(&self) -> bool {
        matches!(self, AgentEvent::Final { .. } | AgentEvent::Error { .. })
    }

    /// JSON payload of the event.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// One `data: <json>` frame, blank-line terminated.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", self.to_json()?))
    }

    /// Decodes one frame or bare JSON payload.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        let payload = frame.trim().strip_prefix("data:").unwrap_or(frame).trim();
        serde_json::from_str(payload)
    }
}

/// Why an event sequence breaks the per-turn ordering guarantee.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event #{index} ({event}) is out of order: {reason}")]
pub struct SequenceError {
    pub index: usize,
    pub event: &'static str,
    pub reason: &'static str,
}

/// Checks one turn's events: at most one leading `connected`, then
/// `typing`/`text`, then exactly one terminal group.
pub fn validate_sequence(events: &[AgentEvent]) -> Result<(), SequenceError> {
    #[derive(PartialEq)]
    enum Phase {
        Start,
        Streaming,
        ToolCalled,
        ToolSucceeded,
        ToolFailed,
        Closed,
    }

    let mut phase = Phase::Start;
    for (index, event) in events.iter().enumerate() {
        let fail = |reason| SequenceError {
            index,
            event: event.type_name(),
            reason,
        };
        phase = match (&phase, event) {
            (Phase::Closed, _) => return Err(fail("channel already closed")),
            (Phase::Start, AgentEvent::Connected { .. }) => Phase::Streaming,
            (_, AgentEvent::Connected { .. }) => return Err(fail("connected must come first")),
            (Phase::Start | Phase::Streaming, AgentEvent::Typing | AgentEvent::Text { .. }) => {
                Phase::Streaming
            }
            (Phase::Start | Phase::Streaming, AgentEvent::ToolCall { .. }) => Phase::ToolCalled,
            (Phase::ToolCalled, AgentEvent::ToolResult { .. }) => Phase::ToolSucceeded,
            (Phase::ToolCalled, AgentEvent::ToolError { .. }) => Phase::ToolFailed,
            (Phase::ToolSucceeded | Phase::ToolFailed, AgentEvent::Final { .. }) => Phase::Closed,
            (Phase::Start | Phase::Streaming, AgentEvent::Final { .. } | AgentEvent::Error { .. }) => {
                Phase::Closed
            }
            (Phase::ToolCalled, AgentEvent::Error { .. }) => Phase::Closed,
            _ => return Err(fail("unexpected at this point")),
        };
    }
    match phase {
        Phase::Closed | Phase::ToolFailed => Ok(()),
        _ => Err(SequenceError {
            index: events.len(),
            event: "end",
            reason: "turn ended without a terminal event",
        }),
    }
}
