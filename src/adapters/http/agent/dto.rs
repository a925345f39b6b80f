//! Data Transfer Objects for the agent endpoints.
//!
//! These types define the HTTP API contract. Turn responses reuse
//! [`TurnResponse`](crate::application::TurnResponse) directly.

use serde::{Deserialize, Serialize};

use crate::application::TurnRequest;
use crate::domain::conversation::{Attachment, ChatMessage, Transcript};
use crate::domain::foundation::{SessionId, TeamId};

/// Maximum allowed length of a single transcript message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 10_000;

/// Maximum number of messages accepted in one transcript.
pub const MAX_MESSAGES: usize = 200;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// One inbound turn: the full transcript plus routing keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub messages: Vec<ChatMessage>,
    pub team_id: String,
    pub session_id: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl AgentRequest {
    /// Validates the payload and converts it into a turn request.
    pub fn into_turn_request(self) -> Result<TurnRequest, ErrorResponse> {
        if self.messages.len() > MAX_MESSAGES {
            return Err(ErrorResponse::bad_request(format!(
                "Transcript exceeds {} messages",
                MAX_MESSAGES
            )));
        }
        if self
            .messages
            .iter()
            .any(|m| m.content.chars().count() > MAX_MESSAGE_LENGTH)
        {
            return Err(ErrorResponse::bad_request(
                "Message content exceeds maximum length",
            ));
        }

        let team_id = TeamId::new(self.team_id)
            .map_err(|e| ErrorResponse::bad_request(format!("Invalid teamId: {}", e)))?;
        let session_id = SessionId::new(self.session_id)
            .map_err(|e| ErrorResponse::bad_request(format!("Invalid sessionId: {}", e)))?;

        Ok(TurnRequest::new(Transcript::new(self.messages), team_id, session_id)
            .with_attachments(self.attachments))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Error response for API errors.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }
}
