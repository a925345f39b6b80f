//! Intake Services Port - Side-effecting collaborators behind the tools.
//!
//! Persistence of matters, reviewer notification and document AI are all
//! external. Each call receives the turn's [`ServiceContext`] so the
//! collaborator can correlate its own logs with ours.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conversation::Attachment;
use crate::domain::foundation::{AgentError, CorrelationId, MatterId, SessionId, TeamId, Timestamp};

/// Identifies the turn a collaborator call belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContext {
    pub correlation_id: CorrelationId,
    pub session_id: SessionId,
    pub team_id: TeamId,
}

impl ServiceContext {
    pub fn new(correlation_id: CorrelationId, session_id: SessionId, team_id: TeamId) -> Self {
        Self {
            correlation_id,
            session_id,
            team_id,
        }
    }
}

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
    pub retryable: bool,
}

impl ServiceError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    /// Converts into the shared taxonomy for `service`.
    pub fn into_agent_error(self, service: &str, correlation_id: CorrelationId) -> AgentError {
        AgentError::external_service(correlation_id, service, self.message, self.retryable)
    }
}

/// What the client is asked for when the contact form is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFormSpec {
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMatter {
    pub name: String,
    pub matter_type: String,
    pub description: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub opposing_party: Option<String>,
    pub urgency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatterRecord {
    pub matter_id: MatterId,
    /// Human-facing reference quoted back to the client.
    pub reference: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawyerReviewRequest {
    pub urgency: String,
    pub matter_type: String,
    pub complexity: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewTicket {
    pub review_id: String,
    pub queued_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysisRequest {
    pub file_id: String,
    pub analysis_type: String,
    pub specific_question: Option<String>,
    /// Matching attachment of the turn, when the caller supplied one.
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub file_id: String,
    pub analysis_type: String,
    pub summary: String,
    #[serde(default)]
    pub findings: Vec<String>,
}

#[async_trait]
pub trait IntakeServices: Send + Sync {
    async fn show_contact_form(
        &self,
        ctx: &ServiceContext,
        reason: Option<String>,
    ) -> Result<ContactFormSpec, ServiceError>;

    async fn create_matter(
        &self,
        ctx: &ServiceContext,
        matter: NewMatter,
    ) -> Result<MatterRecord, ServiceError>;

    async fn request_lawyer_review(
        &self,
        ctx: &ServiceContext,
        request: LawyerReviewRequest,
    ) -> Result<ReviewTicket, ServiceError>;

    async fn analyze_document(
        &self,
        ctx: &ServiceContext,
        request: DocumentAnalysisRequest,
    ) -> Result<DocumentAnalysis, ServiceError>;

    /// Whether the session has already submitted the contact form.
    async fn contact_form_submitted(&self, ctx: &ServiceContext) -> Result<bool, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_converts_with_retry_flag() {
        let cid = CorrelationId::new();
        let err = ServiceError::transient("db timeout").into_agent_error("matters", cid);
        assert!(err.is_retryable());
        assert_eq!(err.correlation_id, cid);

        let err = ServiceError::permanent("bad team").into_agent_error("matters", cid);
        assert!(!err.is_retryable());
    }
}
