//! HTTP handlers for agent endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::adapters::events::ChannelEventSink;
use crate::application::{TurnOrchestrator, TurnResponse};
use crate::ports::EventSink;

use super::dto::{AgentRequest, ErrorResponse, HealthResponse};
use super::sse::event_stream;

/// Default capacity of the per-turn event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Default bound on a stream held open after a retryable `tool_error`.
pub const DEFAULT_HELD_STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Application state for agent endpoints.
#[derive(Clone)]
pub struct AgentAppState {
    pub orchestrator: Arc<TurnOrchestrator>,
    /// Capacity of the per-turn event channel
    pub event_buffer: usize,
    /// How long a stream stays open once the turn left it open
    pub held_stream_timeout: Duration,
}

impl AgentAppState {
    pub fn new(orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self {
            orchestrator,
            event_buffer: DEFAULT_EVENT_BUFFER,
            held_stream_timeout: DEFAULT_HELD_STREAM_TIMEOUT,
        }
    }

    pub fn with_held_stream_timeout(mut self, timeout: Duration) -> Self {
        self.held_stream_timeout = timeout;
        self
    }
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

fn bad_request(error: ErrorResponse) -> (StatusCode, Json<ErrorResponse>) {
    tracing::debug!(message = %error.message, "Rejected agent request");
    (StatusCode::BAD_REQUEST, Json(error))
}

/// Run one turn and return every event at once.
///
/// POST /api/agent
pub async fn run_turn(
    State(state): State<AgentAppState>,
    Json(request): Json<AgentRequest>,
) -> ApiResult<Json<TurnResponse>> {
    let turn = request.into_turn_request().map_err(bad_request)?;
    let response = state.orchestrator.run(turn, None).await;
    Ok(Json(response))
}

/// Run one turn, streaming events as they are produced.
///
/// A turn ending in a retryable `tool_error` leaves the stream open; it is
/// closed after `held_stream_timeout` if the client has not gone first.
///
/// POST /api/agent/stream
pub async fn stream_turn(
    State(state): State<AgentAppState>,
    Json(request): Json<AgentRequest>,
) -> ApiResult<impl IntoResponse> {
    let turn = request.into_turn_request().map_err(bad_request)?;

    let (sink, receiver) = ChannelEventSink::new(state.event_buffer);
    let sink: Arc<dyn EventSink> = Arc::new(sink);

    let orchestrator = state.orchestrator.clone();
    let producer = sink.clone();
    let held_stream_timeout = state.held_stream_timeout;
    tokio::spawn(async move {
        let response = orchestrator.run(turn, Some(producer.clone())).await;
        if producer.is_closed() {
            return;
        }
        tokio::time::sleep(held_stream_timeout).await;
        tracing::debug!(
            correlation_id = %response.correlation_id,
            "Closing stream held open after tool error"
        );
        producer.close();
    });

    Ok(event_stream(receiver, sink))
}

/// Liveness probe.
///
/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::ok())
}
