//! In-Memory Intake Services Adapter
//!
//! Records matters, review requests and document analyses in memory.
//! Useful for tests and local development. Failures can be injected per
//! tool to exercise the dispatcher's error paths.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::conversation::tools::ToolName;
use crate::domain::foundation::{MatterId, SessionId, Timestamp};
use crate::ports::{
    ContactFormSpec, DocumentAnalysis, DocumentAnalysisRequest, IntakeServices,
    LawyerReviewRequest, MatterRecord, NewMatter, ReviewTicket, ServiceContext, ServiceError,
};

/// Fields the contact form asks for.
pub const CONTACT_FORM_FIELDS: [&str; 4] = ["name", "email", "phone", "location"];

#[derive(Debug, Clone, Default)]
pub struct InMemoryIntakeServices {
    matters: Arc<RwLock<Vec<(ServiceContext, NewMatter, MatterRecord)>>>,
    reviews: Arc<RwLock<Vec<(ServiceContext, LawyerReviewRequest, ReviewTicket)>>>,
    analyses: Arc<RwLock<Vec<DocumentAnalysisRequest>>>,
    forms_shown: Arc<RwLock<Vec<ServiceContext>>>,
    submitted_sessions: Arc<RwLock<HashSet<SessionId>>>,
    failures: Arc<RwLock<HashMap<ToolName, ServiceError>>>,
    state_lookup_failure: Arc<RwLock<Option<ServiceError>>>,
}

impl InMemoryIntakeServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call of `tool` fails with `error` from now on.
    pub async fn fail_with(&self, tool: ToolName, error: ServiceError) {
        self.failures.write().await.insert(tool, error);
    }

    /// Session-state lookups fail with `error` from now on.
    pub async fn fail_state_lookup(&self, error: ServiceError) {
        *self.state_lookup_failure.write().await = Some(error);
    }

    /// Marks the session as having submitted the contact form.
    pub async fn record_contact_submission(&self, session_id: SessionId) {
        self.submitted_sessions.write().await.insert(session_id);
    }

    pub async fn matters(&self) -> Vec<NewMatter> {
        self.matters.read().await.iter().map(|(_, m, _)| m.clone()).collect()
    }

    pub async fn matter_count(&self) -> usize {
        self.matters.read().await.len()
    }

    pub async fn review_count(&self) -> usize {
        self.reviews.read().await.len()
    }

    pub async fn analyses(&self) -> Vec<DocumentAnalysisRequest> {
        self.analyses.read().await.clone()
    }

    pub async fn forms_shown(&self) -> usize {
        self.forms_shown.read().await.len()
    }

    /// Contexts of every recorded matter, for correlation assertions.
    pub async fn matter_contexts(&self) -> Vec<ServiceContext> {
        self.matters.read().await.iter().map(|(c, _, _)| c.clone()).collect()
    }

    async fn check_failure(&self, tool: ToolName) -> Result<(), ServiceError> {
        match self.failures.read().await.get(&tool) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn short_reference(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, id[..8].to_uppercase())
}

#[async_trait]
impl IntakeServices for InMemoryIntakeServices {
    async fn show_contact_form(
        &self,
        ctx: &ServiceContext,
        reason: Option<String>,
    ) -> Result<ContactFormSpec, ServiceError> {
        self.check_failure(ToolName::ShowContactForm).await?;
        self.forms_shown.write().await.push(ctx.clone());
        Ok(ContactFormSpec {
            fields: CONTACT_FORM_FIELDS.iter().map(|f| f.to_string()).collect(),
            reason,
        })
    }

    async fn create_matter(
        &self,
        ctx: &ServiceContext,
        matter: NewMatter,
    ) -> Result<MatterRecord, ServiceError> {
        self.check_failure(ToolName::CreateMatter).await?;
        let record = MatterRecord {
            matter_id: MatterId::new(),
            reference: short_reference("MAT"),
            created_at: Timestamp::now(),
        };
        tracing::debug!(
            correlation_id = %ctx.correlation_id,
            reference = %record.reference,
            "Matter recorded in memory"
        );
        self.matters
            .write()
            .await
            .push((ctx.clone(), matter, record.clone()));
        Ok(record)
    }

    async fn request_lawyer_review(
        &self,
        ctx: &ServiceContext,
        request: LawyerReviewRequest,
    ) -> Result<ReviewTicket, ServiceError> {
        self.check_failure(ToolName::RequestLawyerReview).await?;
        let ticket = ReviewTicket {
            review_id: short_reference("REV"),
            queued_at: Timestamp::now(),
        };
        self.reviews
            .write()
            .await
            .push((ctx.clone(), request, ticket.clone()));
        Ok(ticket)
    }

    async fn analyze_document(
        &self,
        _ctx: &ServiceContext,
        request: DocumentAnalysisRequest,
    ) -> Result<DocumentAnalysis, ServiceError> {
        self.check_failure(ToolName::AnalyzeDocument).await?;
        let name = request
            .attachment
            .as_ref()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| request.file_id.clone());
        let analysis = DocumentAnalysis {
            file_id: request.file_id.clone(),
            analysis_type: request.analysis_type.clone(),
            summary: format!("{} analysis of {}", request.analysis_type, name),
            findings: request.specific_question.iter().cloned().collect(),
        };
        self.analyses.write().await.push(request);
        Ok(analysis)
    }

    async fn contact_form_submitted(&self, ctx: &ServiceContext) -> Result<bool, ServiceError> {
        if let Some(err) = self.state_lookup_failure.read().await.clone() {
            return Err(err);
        }
        Ok(self.submitted_sessions.read().await.contains(&ctx.session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{CorrelationId, TeamId};

    fn ctx(session: &str) -> ServiceContext {
        ServiceContext::new(
            CorrelationId::new(),
            SessionId::new(session).unwrap(),
            TeamId::new("team-1").unwrap(),
        )
    }

    fn matter() -> NewMatter {
        NewMatter {
            name: "Jane Doe".into(),
            matter_type: "Family Law".into(),
            description: "Custody dispute".into(),
            email: Some("jane@example.com".into()),
            phone: None,
            location: None,
            opposing_party: None,
            urgency: None,
        }
    }

    #[tokio::test]
    async fn create_matter_records_and_returns_reference() {
        let services = InMemoryIntakeServices::new();

        let record = services.create_matter(&ctx("s-1"), matter()).await.unwrap();

        assert!(record.reference.starts_with("MAT-"));
        assert_eq!(record.reference.len(), "MAT-".len() + 8);
        assert_eq!(services.matter_count().await, 1);
        assert_eq!(services.matters().await[0].name, "Jane Doe");
    }

    #[tokio::test]
    async fn injected_failure_is_returned() {
        let services = InMemoryIntakeServices::new();
        services
            .fail_with(ToolName::CreateMatter, ServiceError::transient("db down"))
            .await;

        let err = services.create_matter(&ctx("s-1"), matter()).await.unwrap_err();

        assert!(err.retryable);
        assert_eq!(services.matter_count().await, 0);
    }

    #[tokio::test]
    async fn contact_submission_is_tracked_per_session() {
        let services = InMemoryIntakeServices::new();
        services
            .record_contact_submission(SessionId::new("s-1").unwrap())
            .await;

        assert!(services.contact_form_submitted(&ctx("s-1")).await.unwrap());
        assert!(!services.contact_form_submitted(&ctx("s-2")).await.unwrap());
    }

    #[tokio::test]
    async fn contact_form_lists_fields() {
        let services = InMemoryIntakeServices::new();

        let form = services
            .show_contact_form(&ctx("s-1"), Some("to follow up".into()))
            .await
            .unwrap();

        assert_eq!(form.fields, vec!["name", "email", "phone", "location"]);
        assert_eq!(form.reason.as_deref(), Some("to follow up"));
        assert_eq!(services.forms_shown().await, 1);
    }
}
