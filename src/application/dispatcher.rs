//! Tool dispatcher.
//!
//! Routes a parsed tool call to its handler. The handler map is built once
//! and never mutated; tests substitute fake handlers through
//! [`ToolDispatcher::with_handler`].
//!
//! Each dispatch re-validates the parameters against the registry schema
//! and each handler re-checks its business preconditions, independent of
//! whatever the model claimed in its narrative. Side effects go through
//! [`IntakeServices`]; tool failures are never retried here.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::conversation::signals;
use crate::domain::conversation::tools::{
    canonical_matter_type, mask_parameters, ToolName, ToolOutcome, ToolRegistry,
};
use crate::domain::conversation::{Attachment, Transcript};
use crate::domain::foundation::{AgentError, ErrorResult};
use crate::domain::team::TeamConfig;
use crate::ports::{
    DocumentAnalysisRequest, IntakeServices, LawyerReviewRequest, NewMatter, ServiceContext,
    TelemetryEvent, TelemetryKeys, TelemetrySink,
};

/// Everything a handler may consult besides its parameters.
pub struct DispatchContext<'a> {
    pub service: ServiceContext,
    pub transcript: &'a Transcript,
    pub attachments: &'a [Attachment],
    pub team: Option<&'a TeamConfig>,
}

impl DispatchContext<'_> {
    fn validation(&self, tool: ToolName, message: impl Into<String>) -> AgentError {
        AgentError::validation(self.service.correlation_id, message).with_detail("tool", tool.as_str())
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with schema-validated parameters.
    async fn handle(
        &self,
        params: &Map<String, Value>,
        ctx: &DispatchContext<'_>,
    ) -> ErrorResult<ToolOutcome>;
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    handlers: HashMap<ToolName, Arc<dyn ToolHandler>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            handlers: HashMap::new(),
            telemetry: None,
        }
    }

    /// Dispatcher with the four intake handlers backed by `services`.
    pub fn standard(registry: Arc<ToolRegistry>, services: Arc<dyn IntakeServices>) -> Self {
        Self::new(registry)
            .with_handler(
                ToolName::ShowContactForm,
                Arc::new(ShowContactFormHandler::new(services.clone())),
            )
            .with_handler(
                ToolName::CreateMatter,
                Arc::new(CreateMatterHandler::new(services.clone())),
            )
            .with_handler(
                ToolName::RequestLawyerReview,
                Arc::new(LawyerReviewHandler::new(services.clone())),
            )
            .with_handler(
                ToolName::AnalyzeDocument,
                Arc::new(AnalyzeDocumentHandler::new(services)),
            )
    }

    pub fn with_handler(mut self, name: ToolName, handler: Arc<dyn ToolHandler>) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn has_handler(&self, name: ToolName) -> bool {
        self.handlers.contains_key(&name)
    }

    /// Validates and runs one tool call.
    ///
    /// `create_matter` failures come back retryable so the conversation can
    /// try again on a later turn.
    pub async fn dispatch(
        &self,
        name: &str,
        params: &Map<String, Value>,
        ctx: &DispatchContext<'_>,
    ) -> ErrorResult<ToolOutcome> {
        let cid = ctx.service.correlation_id;
        let Some(definition) = self.registry.lookup(name) else {
            return Err(AgentError::validation(cid, format!("unknown tool '{}'", name))
                .with_detail("tool", name));
        };
        let tool = definition.name();

        let params = definition.validate(params).map_err(|err| {
            ctx.validation(tool, err.to_string())
                .with_detail("field", err.field.clone())
        })?;

        let handler = self.handlers.get(&tool).ok_or_else(|| {
            AgentError::configuration(cid, format!("no handler registered for '{}'", tool))
        })?;

        let masked = Value::Object(mask_parameters(&params));
        tracing::info!(tool = %tool, parameters = %masked, "Dispatching tool call");

        let started = Instant::now();
        let result = handler.handle(&params, ctx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match result {
            Ok(outcome) => {
                tracing::info!(tool = %tool, elapsed_ms, "Tool call succeeded");
                Ok(outcome)
            }
            Err(err) => {
                let err = if tool == ToolName::CreateMatter {
                    err.with_retryable(true)
                } else {
                    err
                };
                tracing::warn!(tool = %tool, elapsed_ms, error = %err, "Tool call failed");
                Err(err)
            }
        };

        if let Some(telemetry) = &self.telemetry {
            telemetry.record(TelemetryEvent::ToolCalled {
                keys: TelemetryKeys {
                    correlation_id: cid,
                    session_id: ctx.service.session_id.clone(),
                    team_id: ctx.service.team_id.clone(),
                },
                tool,
                succeeded: result.is_ok(),
                elapsed_ms,
            });
        }

        result
    }
}

fn text_param(params: &Map<String, Value>, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required_param(
    params: &Map<String, Value>,
    key: &str,
    tool: ToolName,
    ctx: &DispatchContext<'_>,
) -> ErrorResult<String> {
    text_param(params, key).ok_or_else(|| {
        ctx.validation(tool, format!("parameter '{}' is required", key))
            .with_detail("field", key)
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

pub struct ShowContactFormHandler {
    services: Arc<dyn IntakeServices>,
}

impl ShowContactFormHandler {
    pub fn new(services: Arc<dyn IntakeServices>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ToolHandler for ShowContactFormHandler {
    async fn handle(
        &self,
        params: &Map<String, Value>,
        ctx: &DispatchContext<'_>,
    ) -> ErrorResult<ToolOutcome> {
        let form = self
            .services
            .show_contact_form(&ctx.service, text_param(params, "reason"))
            .await
            .map_err(|e| e.into_agent_error("contact_form", ctx.service.correlation_id))?;

        Ok(ToolOutcome::new(
            ToolName::ShowContactForm,
            "Please share your contact details in the form below so a member of our team can follow up with you.",
            json!({ "fields": form.fields, "reason": form.reason }),
        ))
    }
}

pub struct CreateMatterHandler {
    services: Arc<dyn IntakeServices>,
}

impl CreateMatterHandler {
    pub fn new(services: Arc<dyn IntakeServices>) -> Self {
        Self { services }
    }

    /// The contact-form step must have happened: contact details in the
    /// client's own messages, or a submission recorded for the session.
    async fn contact_step_completed(&self, ctx: &DispatchContext<'_>) -> bool {
        if signals::transcript_has_contact_info(ctx.transcript) {
            return true;
        }
        match self.services.contact_form_submitted(&ctx.service).await {
            Ok(submitted) => submitted,
            Err(err) => {
                tracing::warn!(error = %err, "Session state lookup failed, treating contact form as not submitted");
                false
            }
        }
    }
}

#[async_trait]
impl ToolHandler for CreateMatterHandler {
    async fn handle(
        &self,
        params: &Map<String, Value>,
        ctx: &DispatchContext<'_>,
    ) -> ErrorResult<ToolOutcome> {
        let tool = ToolName::CreateMatter;
        let name = required_param(params, "name", tool, ctx)?;
        let description = required_param(params, "description", tool, ctx)?;
        let raw_type = required_param(params, "matter_type", tool, ctx)?;
        let matter_type = canonical_matter_type(&raw_type).ok_or_else(|| {
            ctx.validation(tool, format!("unsupported matter type '{}'", raw_type))
                .with_detail("field", "matter_type")
        })?;

        if !self.contact_step_completed(ctx).await {
            return Err(ctx.validation(
                tool,
                "contact information must be collected before a matter is created",
            ));
        }

        let matter = NewMatter {
            name,
            matter_type: matter_type.to_string(),
            description,
            email: text_param(params, "email"),
            phone: text_param(params, "phone"),
            location: text_param(params, "location"),
            opposing_party: text_param(params, "opposing_party"),
            urgency: text_param(params, "urgency"),
        };

        let record = self
            .services
            .create_matter(&ctx.service, matter)
            .await
            .map_err(|e| e.into_agent_error("matters", ctx.service.correlation_id))?;

        Ok(ToolOutcome::new(
            tool,
            format!(
                "Thank you. Your {} matter has been created. {} {}. A member of our team will be in touch soon.",
                matter_type,
                signals::MATTER_REFERENCE_MARKER,
                record.reference
            ),
            json!({
                "matterId": record.matter_id,
                "reference": record.reference,
                "matterType": matter_type,
                "createdAt": record.created_at,
            }),
        ))
    }
}

pub struct LawyerReviewHandler {
    services: Arc<dyn IntakeServices>,
}

impl LawyerReviewHandler {
    pub fn new(services: Arc<dyn IntakeServices>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ToolHandler for LawyerReviewHandler {
    async fn handle(
        &self,
        params: &Map<String, Value>,
        ctx: &DispatchContext<'_>,
    ) -> ErrorResult<ToolOutcome> {
        let tool = ToolName::RequestLawyerReview;
        if !ctx.team.is_some_and(|t| t.features.lawyer_review) {
            return Err(ctx.validation(tool, "lawyer review is not enabled for this team"));
        }

        let request = LawyerReviewRequest {
            urgency: required_param(params, "urgency", tool, ctx)?,
            matter_type: required_param(params, "matter_type", tool, ctx)?,
            complexity: text_param(params, "complexity"),
            reason: text_param(params, "reason"),
        };

        let ticket = self
            .services
            .request_lawyer_review(&ctx.service, request)
            .await
            .map_err(|e| e.into_agent_error("lawyer_review", ctx.service.correlation_id))?;

        Ok(ToolOutcome::new(
            tool,
            "I've asked one of our lawyers to review your situation. They will follow up with you directly.",
            json!({ "reviewId": ticket.review_id, "queuedAt": ticket.queued_at }),
        ))
    }
}

pub struct AnalyzeDocumentHandler {
    services: Arc<dyn IntakeServices>,
}

impl AnalyzeDocumentHandler {
    pub fn new(services: Arc<dyn IntakeServices>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ToolHandler for AnalyzeDocumentHandler {
    async fn handle(
        &self,
        params: &Map<String, Value>,
        ctx: &DispatchContext<'_>,
    ) -> ErrorResult<ToolOutcome> {
        let tool = ToolName::AnalyzeDocument;
        if !ctx.team.is_some_and(|t| t.features.document_analysis) {
            return Err(ctx.validation(tool, "document analysis is not enabled for this team"));
        }

        let file_id = required_param(params, "file_id", tool, ctx)?;
        let attachment = ctx.attachments.iter().find(|a| a.id == file_id).cloned();
        if attachment.is_none() && !ctx.attachments.is_empty() {
            return Err(ctx
                .validation(tool, format!("file '{}' is not attached to this message", file_id))
                .with_detail("field", "file_id"));
        }

        let request = DocumentAnalysisRequest {
            file_id,
            analysis_type: required_param(params, "analysis_type", tool, ctx)?,
            specific_question: text_param(params, "specific_question"),
            attachment,
        };

        let analysis = self
            .services
            .analyze_document(&ctx.service, request)
            .await
            .map_err(|e| e.into_agent_error("document_analysis", ctx.service.correlation_id))?;

        Ok(ToolOutcome::new(
            tool,
            format!("Here is what I found in your document: {}", analysis.summary),
            json!({
                "fileId": analysis.file_id,
                "analysisType": analysis.analysis_type,
                "summary": analysis.summary,
                "findings": analysis.findings,
            }),
        ))
    }
}
