//! HTTP adapters - REST and SSE endpoints.
//!
//! - `agent` - Batch and streamed intake turns

pub mod agent;

use std::time::Duration;

use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use agent::{agent_routes, AgentAppState};

use crate::config::ServerConfig;

/// Create the application router.
///
/// # Routes
///
/// - `POST /api/agent` - Batch turn
/// - `POST /api/agent/stream` - Streamed turn
/// - `GET /health` - Liveness probe
///
/// The request timeout bounds the time to the response head, so it does not
/// cut off an open event stream.
pub fn create_router(state: AgentAppState, server: &ServerConfig) -> Router {
    Router::new()
        .nest("/api/agent", agent_routes())
        .route("/health", get(agent::health))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&server.cors_origins_list()))
        .with_state(state)
}

/// Build CORS layer from configured origins.
///
/// No configured origins means any origin may call the API.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(origin = %origin, "Invalid CORS origin");
                None
            })
        })
        .collect();

    tracing::info!(count = parsed.len(), "CORS configured");
    base.allow_origin(parsed)
}
