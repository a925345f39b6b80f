//! HTTP adapter for the intake agent endpoints.

pub mod dto;
pub mod handlers;
pub mod routes;
pub mod sse;

pub use dto::{AgentRequest, ErrorResponse, HealthResponse, MAX_MESSAGES, MAX_MESSAGE_LENGTH};
pub use handlers::{health, AgentAppState, DEFAULT_EVENT_BUFFER, DEFAULT_HELD_STREAM_TIMEOUT};
pub use routes::agent_routes;
