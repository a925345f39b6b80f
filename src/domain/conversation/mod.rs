//! Conversation domain module.
//!
//! Everything needed to decide what an intake turn should do, computed
//! from the transcript alone: extracted context, conversation state, system
//! instructions, tool-call parsing, and the events a turn emits.

mod context;
pub mod events;
pub mod extractor;
mod message;
mod prompt;
mod sanitizer;
pub mod signals;
mod state;
pub mod tools;

pub use context::ConversationContext;
pub use events::{validate_sequence, AgentEvent, SequenceError};
pub use extractor::{ExtractedFacts, ExtractionError, EXTRACTION_TEMPERATURE};
pub use message::{Attachment, ChatMessage, Role, Transcript};
pub use prompt::{directive, PromptComposer};
pub use sanitizer::{
    sanitize_context_value, ResponseSanitizer, SanitizationError, MAX_CONTEXT_FIELD_CHARS,
    MAX_RESPONSE_LENGTH,
};
pub use state::{
    decide_state, is_sensitive_matter, pre_extraction_state, should_create_matter,
    ConversationState, QUALIFYING_DESCRIPTION_CHARS,
};
