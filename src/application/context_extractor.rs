//! Context extraction with a model call.
//!
//! Decides cheaply where it can (empty, greeting-opened and very short
//! transcripts) and otherwise asks the model for the facts. Failures never
//! abort the turn:
//!
//! - model call fails: general-inquiry context, which never triggers a side effect
//! - output unusable: minimal context in GATHERING_INFORMATION

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::conversation::extractor::{
    assemble_context, extraction_input, extraction_instructions, fallback_context,
    heuristic_context, parse_extraction,
};
use crate::domain::conversation::{
    decide_state, pre_extraction_state, signals, ConversationContext, Transcript,
    EXTRACTION_TEMPERATURE,
};
use crate::domain::foundation::AgentError;
use crate::ports::{AIError, AIProvider, CompletionRequest, RequestMetadata, PURPOSE_EXTRACTION};

/// Outcome of the extraction model call, when one was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCall {
    pub latency_ms: u64,
    pub succeeded: bool,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub context: ConversationContext,
    pub model_call: Option<ModelCall>,
    /// Set when the context was downgraded after a failure.
    pub degraded: Option<AgentError>,
}

impl Extraction {
    fn deterministic(context: ConversationContext) -> Self {
        Self {
            context,
            model_call: None,
            degraded: None,
        }
    }
}

pub struct ContextExtractor {
    provider: Arc<dyn AIProvider>,
    max_tokens: u32,
    timeout: Duration,
}

impl ContextExtractor {
    pub fn new(provider: Arc<dyn AIProvider>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            provider,
            max_tokens,
            timeout,
        }
    }

    /// Builds the turn's context. The returned context's `state` is final.
    pub async fn extract(&self, transcript: &Transcript, metadata: RequestMetadata) -> Extraction {
        // Empty and greeting-opened transcripts have a fixed state, so the
        // extracted facts could not change the decision.
        if let Some(state) = pre_extraction_state(transcript) {
            let context = ConversationContext {
                has_contact_info: signals::transcript_has_contact_info(transcript),
                ..ConversationContext::minimal()
            };
            return Extraction::deterministic(context.with_state(state));
        }

        if let Some(ctx) = heuristic_context(transcript) {
            let state = decide_state(transcript, &ctx);
            return Extraction::deterministic(ctx.with_state(state));
        }

        let correlation_id = metadata.correlation_id;
        let request = CompletionRequest::new(metadata)
            .with_system_prompt(extraction_instructions())
            .with_message(crate::ports::MessageRole::User, extraction_input(transcript))
            .with_max_tokens(self.max_tokens)
            .with_temperature(EXTRACTION_TEMPERATURE);

        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(AIError::timeout(self.timeout.as_secs() as u32)),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let output = match result {
            Ok(response) => response.content,
            Err(err) => {
                tracing::warn!(error = %err, "Context extraction call failed, treating as general inquiry");
                let ctx = fallback_context(transcript);
                let state = decide_state(transcript, &ctx);
                return Extraction {
                    context: ctx.with_state(state),
                    model_call: Some(ModelCall {
                        latency_ms,
                        succeeded: false,
                    }),
                    degraded: Some(AgentError::ai_service(
                        correlation_id,
                        err.to_string(),
                        err.is_retryable(),
                    )),
                };
            }
        };

        let model_call = Some(ModelCall {
            latency_ms,
            succeeded: true,
        });

        match parse_extraction(&output) {
            Ok(facts) => Extraction {
                context: assemble_context(transcript, facts),
                model_call,
                degraded: None,
            },
            Err(err) => {
                let err = AgentError::conversation_state(correlation_id, err.to_string());
                tracing::warn!(error = %err, "Extraction output unusable, gathering information");
                let context = ConversationContext {
                    has_contact_info: signals::transcript_has_contact_info(transcript),
                    ..ConversationContext::minimal()
                };
                Extraction {
                    context,
                    model_call,
                    degraded: Some(err),
                }
            }
        }
    }
}
