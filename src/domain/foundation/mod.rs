//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, the shared error taxonomy, and the retry policy
//! that every stage of an intake turn builds on.

mod errors;
mod ids;
mod retry;
mod timestamp;

pub use errors::{AgentError, AgentErrorKind, ErrorCode, ErrorResult, ValidationError};
pub use ids::{CorrelationId, MatterId, SessionId, TeamId};
pub use retry::{with_retry, with_retry_if, Backoff, RetryPolicy, RetryReport, Retryable};
pub use timestamp::Timestamp;
