//! Mock AI Provider for testing.
//!
//! Provides a configurable mock implementation of the AIProvider port,
//! allowing tests to run without calling real AI APIs.
//!
//! # Features
//!
//! - Scripted replies per call purpose (extraction vs. response)
//! - Simulated delays for timeout testing
//! - Error injection for retry testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_extraction(r#"{"legal_issue_type": "Family Law"}"#)
//!     .with_response("Can you tell me more?");
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, ProviderInfo, PURPOSE_EXTRACTION,
    PURPOSE_RESPONSE,
};

/// Reply used once a purpose's queue is exhausted.
pub const DEFAULT_MOCK_RESPONSE: &str = "Mock response";

type Scripted = Result<String, AIError>;

/// Mock AI provider for testing.
///
/// Replies are consumed in order from a queue chosen by the request's
/// `metadata.purpose`.
#[derive(Debug, Clone)]
pub struct MockAIProvider {
    queues: Arc<Mutex<HashMap<&'static str, VecDeque<Scripted>>>>,
    info: ProviderInfo,
    delay: Duration,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockAIProvider {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            info: ProviderInfo::new("mock", "mock-model-1"),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn push(self, purpose: &'static str, reply: Scripted) -> Self {
        lock(&self.queues).entry(purpose).or_default().push_back(reply);
        self
    }

    /// Queues a reply for the reply-generating call.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.push(PURPOSE_RESPONSE, Ok(content.into()))
    }

    /// Queues a reply for the context-extraction call.
    pub fn with_extraction(self, content: impl Into<String>) -> Self {
        self.push(PURPOSE_EXTRACTION, Ok(content.into()))
    }

    /// Queues an error for the reply-generating call.
    pub fn with_error(self, error: AIError) -> Self {
        self.push(PURPOSE_RESPONSE, Err(error))
    }

    /// Queues an error for the context-extraction call.
    pub fn with_extraction_error(self, error: AIError) -> Self {
        self.push(PURPOSE_EXTRACTION, Err(error))
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of calls made for one purpose.
    pub fn calls_for(&self, purpose: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.metadata.purpose == purpose)
            .count()
    }

    pub fn get_calls(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn next_reply(&self, purpose: &str) -> Scripted {
        lock(&self.queues)
            .get_mut(purpose)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(DEFAULT_MOCK_RESPONSE.to_string()))
    }
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        let purpose = request.metadata.purpose;
        lock(&self.calls).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let content = self.next_reply(purpose)?;
        Ok(CompletionResponse::text(content, self.info.model.clone()))
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}
