//! Error types for the domain layer.
//!
//! [`ValidationError`] covers value-object construction. [`AgentError`] is the
//! shared taxonomy every stage of a turn reports through; it always carries
//! the turn's correlation id so user-visible failures can be traced.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::CorrelationId;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

/// Error codes, one per taxonomy branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ValidationFailed,
    ConversationState,
    AiService,
    ExternalService,
    Configuration,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::ConversationState => "CONVERSATION_STATE",
            ErrorCode::AiService => "AI_SERVICE",
            ErrorCode::ExternalService => "EXTERNAL_SERVICE",
            ErrorCode::Configuration => "CONFIGURATION",
        };
        write!(f, "{}", s)
    }
}

/// The branch of the taxonomy an [`AgentError`] belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentErrorKind {
    /// Bad input to a pure function. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Conversation state could not be derived.
    #[error("conversation state error: {0}")]
    ConversationState(String),

    /// The generative model call failed.
    #[error("AI service error: {message}")]
    AiService { message: String, retryable: bool },

    /// A collaborator (matter store, reviewer queue, document AI) failed.
    #[error("external service '{service}' failed: {message}")]
    ExternalService {
        service: String,
        message: String,
        retryable: bool,
    },

    /// Required setup is missing. Fatal for the turn.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Shared error type for every stage of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {kind} (correlation_id={correlation_id})")]
pub struct AgentError {
    pub kind: AgentErrorKind,
    pub code: ErrorCode,
    pub correlation_id: CorrelationId,
    pub metadata: BTreeMap<String, String>,
}

/// Success/failure wrapper used across the core.
pub type ErrorResult<T> = Result<T, AgentError>;

impl AgentError {
    /// Creates a new error of the given kind.
    pub fn new(kind: AgentErrorKind, correlation_id: CorrelationId) -> Self {
        let code = match &kind {
            AgentErrorKind::Validation(_) => ErrorCode::ValidationFailed,
            AgentErrorKind::ConversationState(_) => ErrorCode::ConversationState,
            AgentErrorKind::AiService { .. } => ErrorCode::AiService,
            AgentErrorKind::ExternalService { .. } => ErrorCode::ExternalService,
            AgentErrorKind::Configuration(_) => ErrorCode::Configuration,
        };
        Self {
            kind,
            code,
            correlation_id,
            metadata: BTreeMap::new(),
        }
    }

    pub fn validation(correlation_id: CorrelationId, message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::Validation(message.into()), correlation_id)
    }

    pub fn conversation_state(correlation_id: CorrelationId, message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::ConversationState(message.into()), correlation_id)
    }

    pub fn ai_service(
        correlation_id: CorrelationId,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::new(
            AgentErrorKind::AiService {
                message: message.into(),
                retryable,
            },
            correlation_id,
        )
    }

    pub fn external_service(
        correlation_id: CorrelationId,
        service: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::new(
            AgentErrorKind::ExternalService {
                service: service.into(),
                message: message.into(),
                retryable,
            },
            correlation_id,
        )
    }

    pub fn configuration(correlation_id: CorrelationId, message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::Configuration(message.into()), correlation_id)
    }

    /// Converts a field-level validation failure.
    pub fn from_validation(correlation_id: CorrelationId, err: ValidationError) -> Self {
        let field = err.field().to_string();
        Self::validation(correlation_id, err.to_string()).with_detail("field", field)
    }

    /// Adds contextual metadata.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Overrides the retryable flag of an external-service error.
    ///
    /// No effect on other kinds.
    pub fn with_retryable(mut self, value: bool) -> Self {
        if let AgentErrorKind::ExternalService { retryable, .. } = &mut self.kind {
            *retryable = value;
        }
        self
    }

    /// Returns true if retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AgentErrorKind::AiService { retryable, .. }
            | AgentErrorKind::ExternalService { retryable, .. } => *retryable,
            AgentErrorKind::Validation(_)
            | AgentErrorKind::ConversationState(_)
            | AgentErrorKind::Configuration(_) => false,
        }
    }

    /// Plain-language message safe to show an end user.
    ///
    /// Never includes internal detail; always ends with the correlation id.
    pub fn user_message(&self) -> String {
        let base = match &self.kind {
            AgentErrorKind::Validation(_) => {
                "Some of the information provided could not be processed. Please check it and try again."
            }
            AgentErrorKind::ConversationState(_) => {
                "I lost track of our conversation for a moment. Could you tell me a bit more about your situation?"
            }
            AgentErrorKind::AiService { .. } => {
                "Our assistant is temporarily unavailable. Please try again in a few moments."
            }
            AgentErrorKind::ExternalService { .. } => {
                "Something went wrong while handling your request. Please try again shortly."
            }
            AgentErrorKind::Configuration(_) => {
                "This service is not fully set up yet. Please contact the firm directly."
            }
        };
        format!("{} (Reference: {})", base, self.correlation_id)
    }
}
