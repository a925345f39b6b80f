//! Turn orchestrator - the per-turn control loop.
//!
//! One call to [`TurnOrchestrator::run`] handles exactly one inbound message:
//!
//! 1. resolve team configuration (failures degrade to none)
//! 2. short-circuit if a matter was already created in this conversation
//! 3. extract context and decide the conversation state
//! 4. compose instructions
//! 5. call the model under the retry policy
//! 6. substitute a fallback when the output is empty
//! 7. dispatch a tool call, or stream the prose
//!
//! Events are produced by a single writer in a fixed order: at most one
//! `connected`, then `typing`/`text`, then one terminal group. A
//! `tool_error` leaves the channel open; `final` and `error` close it.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use super::context_extractor::{ContextExtractor, Extraction};
use super::dispatcher::{DispatchContext, ToolDispatcher};
use crate::domain::conversation::tools::{ParsedToolCall, ToolCallParser, ToolName};
use crate::domain::conversation::{
    signals, AgentEvent, Attachment, ConversationContext, ConversationState, PromptComposer,
    ResponseSanitizer, Transcript,
};
use crate::domain::foundation::{
    with_retry, AgentError, AgentErrorKind, CorrelationId, RetryPolicy, SessionId, TeamId,
};
use crate::domain::team::TeamConfig;
use crate::ports::{
    AIError, AIProvider, CompletionRequest, EventSink, RequestMetadata, ServiceContext,
    TeamDirectory, TelemetryEvent, TelemetryKeys, TelemetrySink, PURPOSE_EXTRACTION,
    PURPOSE_RESPONSE,
};

/// Reply when the conversation already produced a matter.
pub const ALREADY_HANDLED_MESSAGE: &str = "Your matter has already been created and our team has your details. \
     Someone will be in touch soon. Is there anything else I can help you with?";

/// Reply when the model returned nothing usable.
pub const FALLBACK_MESSAGE: &str = "I'm sorry, I wasn't able to put together a response just now. \
     Could you tell me a little more about your situation?";

/// Reply when the model's tool call could not be understood.
pub const REPHRASE_MESSAGE: &str =
    "I'm sorry, I had trouble processing that request. Could you please rephrase what you need?";

const MATTER_RETRY_MESSAGE: &str =
    "I wasn't able to create your matter just now. Please try again in a moment.";

const TOOL_APOLOGY_MESSAGE: &str =
    "I'm sorry, something went wrong while completing that step. Our team has been notified.";

/// Tunables of the turn loop.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub retry: RetryPolicy,
    /// Bound on each model attempt.
    pub model_timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    pub extraction_max_tokens: u32,
    /// Trimmed output shorter than this is treated as empty.
    pub min_response_chars: usize,
    /// Words per `text` event in streaming mode.
    pub chunk_words: usize,
    pub chunk_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            model_timeout: Duration::from_secs(30),
            max_tokens: 1024,
            temperature: 0.7,
            extraction_max_tokens: 512,
            min_response_chars: 2,
            chunk_words: 3,
            chunk_delay: Duration::from_millis(30),
        }
    }
}

/// One inbound message plus the full transcript it belongs to.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub transcript: Transcript,
    pub team_id: TeamId,
    pub session_id: SessionId,
    pub attachments: Vec<Attachment>,
}

impl TurnRequest {
    pub fn new(transcript: Transcript, team_id: TeamId, session_id: SessionId) -> Self {
        Self {
            transcript,
            team_id,
            session_id,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Final,
    ToolError,
    Error,
}

impl Terminal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Terminal::Final => "final",
            Terminal::ToolError => "tool_error",
            Terminal::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub correlation_id: CorrelationId,
    /// Text shown to the client: the final response or the error message.
    pub response: String,
    pub state: ConversationState,
    pub context: ConversationContext,
    pub terminal: Terminal,
    /// Set when the client may retry within the same conversation.
    pub allow_retry: bool,
    /// Every event of the turn, in emission order.
    pub events: Vec<AgentEvent>,
}

/// Single writer for a turn's events.
struct Emitter {
    sink: Option<Arc<dyn EventSink>>,
    events: Vec<AgentEvent>,
}

impl Emitter {
    fn new(sink: Option<Arc<dyn EventSink>>) -> Self {
        Self {
            sink,
            events: Vec::new(),
        }
    }

    fn streaming(&self) -> bool {
        self.sink.is_some()
    }

    /// Returns false once the consumer has gone away.
    async fn emit(&mut self, event: AgentEvent) -> bool {
        self.events.push(event.clone());
        let Some(sink) = &self.sink else {
            return true;
        };
        let closes = event.closes_channel();
        let delivered = sink.send(event).await;
        if closes {
            sink.close();
        }
        delivered
    }
}

/// Everything a turn carries around.
struct Turn {
    cid: CorrelationId,
    request: TurnRequest,
    team: Option<TeamConfig>,
    emitter: Emitter,
}

impl Turn {
    fn keys(&self) -> TelemetryKeys {
        TelemetryKeys {
            correlation_id: self.cid,
            session_id: self.request.session_id.clone(),
            team_id: self.request.team_id.clone(),
        }
    }

    fn metadata(&self, purpose: &'static str) -> RequestMetadata {
        RequestMetadata::new(
            self.cid,
            self.request.session_id.clone(),
            self.request.team_id.clone(),
            purpose,
        )
    }
}

pub struct TurnOrchestrator {
    provider: Arc<dyn AIProvider>,
    teams: Arc<dyn TeamDirectory>,
    dispatcher: Arc<ToolDispatcher>,
    telemetry: Arc<dyn TelemetrySink>,
    extractor: ContextExtractor,
    composer: PromptComposer,
    parser: ToolCallParser,
    sanitizer: ResponseSanitizer,
    config: OrchestratorConfig,
}

impl TurnOrchestrator {
    pub fn new(
        provider: Arc<dyn AIProvider>,
        teams: Arc<dyn TeamDirectory>,
        dispatcher: Arc<ToolDispatcher>,
        telemetry: Arc<dyn TelemetrySink>,
        config: OrchestratorConfig,
    ) -> Self {
        let registry = dispatcher.registry().clone();
        Self {
            extractor: ContextExtractor::new(
                provider.clone(),
                config.extraction_max_tokens,
                config.model_timeout,
            ),
            composer: PromptComposer::new(registry.clone()),
            parser: ToolCallParser::new(registry),
            sanitizer: ResponseSanitizer::new(),
            provider,
            teams,
            dispatcher,
            telemetry,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one turn. Streams to `sink` when given, otherwise collects.
    ///
    /// Never fails: every failure becomes a terminal event in the response.
    pub async fn run(&self, request: TurnRequest, sink: Option<Arc<dyn EventSink>>) -> TurnResponse {
        let cid = CorrelationId::new();
        let span = tracing::info_span!(
            "agent_turn",
            correlation_id = %cid,
            session_id = %request.session_id,
            team_id = %request.team_id,
        );
        let turn = Turn {
            cid,
            request,
            team: None,
            emitter: Emitter::new(sink),
        };
        self.run_turn(turn).instrument(span).await
    }

    async fn run_turn(&self, mut turn: Turn) -> TurnResponse {
        let streaming = turn.emitter.streaming();
        tracing::info!(
            messages = turn.request.transcript.len(),
            streaming,
            "Turn started"
        );
        self.telemetry.record(TelemetryEvent::TurnStarted {
            keys: turn.keys(),
            message_count: turn.request.transcript.len(),
            streaming,
        });

        turn.emitter
            .emit(AgentEvent::Connected {
                correlation_id: turn.cid,
            })
            .await;

        turn.team = self.resolve_team(&turn.request.team_id).await;

        if signals::has_completion_marker(&turn.request.transcript) {
            tracing::info!("Matter already created in this conversation, short-circuiting");
            let context = ConversationContext::minimal().with_state(ConversationState::MatterCreated);
            return self
                .finish_with_text(turn, context, ConversationState::MatterCreated, ALREADY_HANDLED_MESSAGE)
                .await;
        }

        turn.emitter.emit(AgentEvent::Typing).await;

        let extraction = self
            .extractor
            .extract(&turn.request.transcript, turn.metadata(PURPOSE_EXTRACTION))
            .await;
        let context = self.record_extraction(&turn, extraction);
        let state = context.state;
        tracing::info!(state = %state, "Conversation state decided");

        let instructions = self.composer.build(state, &context, turn.team.as_ref());
        let output = match self.call_model(&turn, instructions).await {
            Ok(output) => output,
            Err(err) => return self.finish_with_error(turn, context, state, err).await,
        };

        let output = match self.sanitizer.sanitize(&output) {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(error = %err, "Model output rejected by sanitizer");
                String::new()
            }
        };

        if output.trim().chars().count() < self.config.min_response_chars.max(1) {
            tracing::warn!("Model returned empty output, using fallback");
            return self.finish_with_text(turn, context, state, FALLBACK_MESSAGE).await;
        }

        match self.parser.parse(&output) {
            Ok(Some(parsed)) => self.run_tool(turn, context, parsed).await,
            Ok(None) => {
                let text = output.trim().to_string();
                self.finish_with_text(turn, context, state, &text).await
            }
            Err(err) => {
                let err = AgentError::validation(turn.cid, err.to_string());
                tracing::warn!(error = %err, "Tool call could not be parsed");
                self.finish_with_text(turn, context, state, REPHRASE_MESSAGE).await
            }
        }
    }

    async fn resolve_team(&self, team_id: &TeamId) -> Option<TeamConfig> {
        match self.teams.get_team(team_id).await {
            Ok(Some(team)) => Some(team),
            Ok(None) => {
                tracing::debug!("No configuration for team");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "Team lookup failed, continuing without configuration");
                None
            }
        }
    }

    fn record_extraction(&self, turn: &Turn, extraction: Extraction) -> ConversationContext {
        if let Some(call) = extraction.model_call {
            self.telemetry.record(TelemetryEvent::ModelCalled {
                keys: turn.keys(),
                purpose: PURPOSE_EXTRACTION,
                attempts: 1,
                latency_ms: call.latency_ms,
                succeeded: call.succeeded,
            });
        }
        if let Some(err) = &extraction.degraded {
            tracing::info!(code = %err.code, "Context extraction degraded");
        }
        extraction.context
    }

    /// The reply-generating call, retried on transient failures.
    async fn call_model(&self, turn: &Turn, instructions: String) -> Result<String, AgentError> {
        let request = CompletionRequest::new(turn.metadata(PURPOSE_RESPONSE))
            .with_system_prompt(instructions)
            .with_transcript(turn.request.transcript.messages())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);
        let timeout = self.config.model_timeout;

        let started = Instant::now();
        let report = with_retry(&self.config.retry, |attempt| {
            let request = request.clone();
            async move {
                tracing::debug!(attempt, "Calling model");
                match tokio::time::timeout(timeout, self.provider.complete(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(AIError::timeout(timeout.as_secs() as u32)),
                }
            }
        })
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        self.telemetry.record(TelemetryEvent::ModelCalled {
            keys: turn.keys(),
            purpose: PURPOSE_RESPONSE,
            attempts: report.attempts,
            latency_ms,
            succeeded: report.result.is_ok(),
        });

        let attempts = report.attempts;
        report
            .into_result()
            .map(|response| response.content)
            .map_err(|err| {
                tracing::error!(error = %err, attempts, "Model call failed");
                AgentError::ai_service(turn.cid, err.to_string(), err.is_retryable())
                    .with_detail("attempts", attempts.to_string())
            })
    }

    async fn run_tool(
        &self,
        mut turn: Turn,
        context: ConversationContext,
        parsed: ParsedToolCall,
    ) -> TurnResponse {
        let tool = parsed.call.name();
        tracing::info!(tool = %tool, "Model requested a tool");

        if !parsed.preamble.trim().is_empty() {
            self.emit_text(&mut turn, parsed.preamble.trim()).await;
        }
        turn.emitter
            .emit(AgentEvent::ToolCall {
                name: tool,
                parameters: parsed.sanitized_parameters.clone(),
            })
            .await;

        let service = ServiceContext::new(
            turn.cid,
            turn.request.session_id.clone(),
            turn.request.team_id.clone(),
        );
        let result = {
            let ctx = DispatchContext {
                service,
                transcript: &turn.request.transcript,
                attachments: &turn.request.attachments,
                team: turn.team.as_ref(),
            };
            self.dispatcher
                .dispatch(tool.as_str(), parsed.call.parameters(), &ctx)
                .await
        };

        match result {
            Ok(outcome) => {
                let state = match tool {
                    ToolName::CreateMatter => ConversationState::MatterCreated,
                    ToolName::ShowContactForm => ConversationState::ShowingContactForm,
                    _ => context.state,
                };
                turn.emitter
                    .emit(AgentEvent::ToolResult {
                        name: tool,
                        result: outcome.data,
                        state,
                    })
                    .await;
                self.finish_final(turn, context, state, outcome.message).await
            }
            Err(err) if matches!(err.kind, AgentErrorKind::Configuration(_)) => {
                let state = context.state;
                self.finish_with_error(turn, context, state, err).await
            }
            Err(err) if tool == ToolName::CreateMatter => {
                self.finish_with_tool_error(turn, context, tool, err, true).await
            }
            Err(err) => self.finish_with_tool_error(turn, context, tool, err, false).await,
        }
    }

    /// Emits `text` for prose, paced in streaming mode.
    async fn emit_text(&self, turn: &mut Turn, text: &str) {
        if !turn.emitter.streaming() {
            turn.emitter.emit(AgentEvent::Text { text: text.to_string() }).await;
            return;
        }
        let chunks = chunk_words(text, self.config.chunk_words);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.into_iter().enumerate() {
            if !turn.emitter.emit(AgentEvent::Text { text: chunk }).await {
                tracing::debug!("Client went away, stopping text emission");
                return;
            }
            if i < last && !self.config.chunk_delay.is_zero() {
                tokio::time::sleep(self.config.chunk_delay).await;
            }
        }
    }

    async fn finish_with_text(
        &self,
        mut turn: Turn,
        context: ConversationContext,
        state: ConversationState,
        text: &str,
    ) -> TurnResponse {
        self.emit_text(&mut turn, text).await;
        self.finish_final(turn, context, state, text.to_string()).await
    }

    async fn finish_final(
        &self,
        mut turn: Turn,
        context: ConversationContext,
        state: ConversationState,
        response: String,
    ) -> TurnResponse {
        turn.emitter
            .emit(AgentEvent::Final {
                response: response.clone(),
            })
            .await;
        self.end(turn, context, state, Terminal::Final, response, false)
    }

    async fn finish_with_tool_error(
        &self,
        mut turn: Turn,
        context: ConversationContext,
        tool: ToolName,
        err: AgentError,
        allow_retry: bool,
    ) -> TurnResponse {
        let reference = format!("(Reference: {})", turn.cid);
        let (message, state) = if allow_retry {
            (
                format!("{} {}", MATTER_RETRY_MESSAGE, reference),
                ConversationState::MatterCreationFailed,
            )
        } else {
            (err.user_message(), context.state)
        };

        turn.emitter
            .emit(AgentEvent::ToolError {
                name: tool,
                message: message.clone(),
                allow_retry,
                correlation_id: turn.cid,
            })
            .await;
        self.telemetry.record(TelemetryEvent::TurnFailed {
            keys: turn.keys(),
            code: err.code,
        });

        if allow_retry {
            // Channel stays open so the conversation can continue.
            return self.end(turn, context, state, Terminal::ToolError, message, true);
        }

        let apology = format!("{} {}", TOOL_APOLOGY_MESSAGE, reference);
        self.finish_final(turn, context, state, apology).await
    }

    async fn finish_with_error(
        &self,
        mut turn: Turn,
        context: ConversationContext,
        state: ConversationState,
        err: AgentError,
    ) -> TurnResponse {
        let message = err.user_message();
        turn.emitter
            .emit(AgentEvent::Error {
                message: message.clone(),
                correlation_id: turn.cid,
            })
            .await;
        self.telemetry.record(TelemetryEvent::TurnFailed {
            keys: turn.keys(),
            code: err.code,
        });
        self.end(turn, context, state, Terminal::Error, message, false)
    }

    fn end(
        &self,
        turn: Turn,
        context: ConversationContext,
        state: ConversationState,
        terminal: Terminal,
        response: String,
        allow_retry: bool,
    ) -> TurnResponse {
        tracing::info!(state = %state, terminal = terminal.as_str(), "Turn ended");
        self.telemetry.record(TelemetryEvent::TurnEnded {
            keys: turn.keys(),
            state,
            terminal: terminal.as_str(),
        });
        TurnResponse {
            correlation_id: turn.cid,
            response,
            state,
            context,
            terminal,
            allow_retry,
            events: turn.emitter.events,
        }
    }
}

/// Splits text into chunks of `words` words, keeping the whitespace so the
/// chunks concatenate back to the input.
fn chunk_words(text: &str, words: usize) -> Vec<String> {
    let words = words.max(1);
    let pieces: Vec<&str> = text.split_inclusive(char::is_whitespace).collect();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for piece in pieces {
        current.push_str(piece);
        if !piece.trim().is_empty() {
            count += 1;
        }
        if count >= words && piece.ends_with(char::is_whitespace) {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
