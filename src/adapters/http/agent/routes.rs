//! Axum router configuration for agent endpoints.

use axum::{routing::post, Router};

use super::handlers::{run_turn, stream_turn, AgentAppState};

/// Create the agent API router.
///
/// # Routes
///
/// - `POST /` - Run a turn, return the batch JSON response
/// - `POST /stream` - Run a turn as a `text/event-stream`
///
/// Suitable for mounting at `/api/agent`.
pub fn agent_routes() -> Router<AgentAppState> {
    Router::new()
        .route("/", post(run_turn))
        .route("/stream", post(stream_turn))
}
