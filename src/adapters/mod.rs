//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the intake core to external systems:
//! - `ai` - Model providers (Anthropic, scripted mock)
//! - `events` - Per-turn event sinks (channel, in-memory)
//! - `http` - axum router for batch and streamed turns
//! - `intake` - In-memory team directory and intake services
//! - `telemetry` - Structured telemetry sinks

pub mod ai;
pub mod events;
pub mod http;
pub mod intake;
pub mod telemetry;

pub use telemetry::{NoOpTelemetry, RecordingTelemetry, TracingTelemetry};
