//! Application layer - the turn loop and the services it coordinates.
//!
//! Domain decisions stay pure; this layer owns every call that crosses a
//! port: the extraction and reply model calls, tool dispatch, telemetry,
//! and event emission.

pub mod context_extractor;
pub mod dispatcher;
pub mod orchestrator;

pub use context_extractor::{ContextExtractor, Extraction, ModelCall};
pub use dispatcher::{
    AnalyzeDocumentHandler, CreateMatterHandler, DispatchContext, LawyerReviewHandler,
    ShowContactFormHandler, ToolDispatcher, ToolHandler,
};
pub use orchestrator::{
    OrchestratorConfig, Terminal, TurnOrchestrator, TurnRequest, TurnResponse,
    ALREADY_HANDLED_MESSAGE, FALLBACK_MESSAGE, REPHRASE_MESSAGE,
};
