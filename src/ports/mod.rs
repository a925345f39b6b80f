//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the intake core and the outside world. Adapters implement these ports.
//!
//! - `AIProvider` - The generative model
//! - `TeamDirectory` - Tenant configuration lookup
//! - `IntakeServices` - Matter creation, reviewer queue, document AI
//! - `TelemetrySink` - Structured turn telemetry
//! - `EventSink` - Per-turn output channel

mod ai_provider;
mod event_sink;
mod intake_services;
mod team_directory;
mod telemetry;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, Message,
    MessageRole, ProviderInfo, RequestMetadata, TokenUsage, PURPOSE_EXTRACTION, PURPOSE_RESPONSE,
};
pub use event_sink::EventSink;
pub use intake_services::{
    ContactFormSpec, DocumentAnalysis, DocumentAnalysisRequest, IntakeServices,
    LawyerReviewRequest, MatterRecord, NewMatter, ReviewTicket, ServiceContext, ServiceError,
};
pub use team_directory::TeamDirectory;
pub use telemetry::{TelemetryEvent, TelemetryKeys, TelemetrySink};
