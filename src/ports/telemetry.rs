//! Telemetry Port - Structured turn events for an external collector.

use serde::Serialize;

use crate::domain::conversation::tools::ToolName;
use crate::domain::conversation::ConversationState;
use crate::domain::foundation::{CorrelationId, ErrorCode, SessionId, TeamId};

/// Keys every telemetry event carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryKeys {
    pub correlation_id: CorrelationId,
    pub session_id: SessionId,
    pub team_id: TeamId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    TurnStarted {
        keys: TelemetryKeys,
        message_count: usize,
        streaming: bool,
    },
    ModelCalled {
        keys: TelemetryKeys,
        purpose: &'static str,
        attempts: u32,
        latency_ms: u64,
        succeeded: bool,
    },
    ToolCalled {
        keys: TelemetryKeys,
        tool: ToolName,
        succeeded: bool,
        elapsed_ms: u64,
    },
    TurnEnded {
        keys: TelemetryKeys,
        state: ConversationState,
        terminal: &'static str,
    },
    TurnFailed {
        keys: TelemetryKeys,
        #[serde(serialize_with = "serialize_code")]
        code: ErrorCode,
    },
}

fn serialize_code<S: serde::Serializer>(code: &ErrorCode, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(code)
}

impl TelemetryEvent {
    pub fn keys(&self) -> &TelemetryKeys {
        match self {
            TelemetryEvent::TurnStarted { keys, .. }
            | TelemetryEvent::ModelCalled { keys, .. }
            | TelemetryEvent::ToolCalled { keys, .. }
            | TelemetryEvent::TurnEnded { keys, .. }
            | TelemetryEvent::TurnFailed { keys, .. } => keys,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::TurnStarted { .. } => "turn_started",
            TelemetryEvent::ModelCalled { .. } => "model_called",
            TelemetryEvent::ToolCalled { .. } => "tool_called",
            TelemetryEvent::TurnEnded { .. } => "turn_ended",
            TelemetryEvent::TurnFailed { .. } => "turn_failed",
        }
    }
}

/// Receives telemetry events. Recording must not fail the turn.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_name_and_code() {
        let keys = TelemetryKeys {
            correlation_id: CorrelationId::new(),
            session_id: SessionId::new("s").unwrap(),
            team_id: TeamId::new("t").unwrap(),
        };
        let event = TelemetryEvent::TurnFailed {
            keys,
            code: ErrorCode::AiService,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "turn_failed");
        assert_eq!(value["code"], "AI_SERVICE");
        assert_eq!(event.name(), "turn_failed");
    }
}
