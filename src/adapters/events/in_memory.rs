//! In-memory event sink for testing and batch turns.
//!
//! Captures every event for later inspection. A capacity can be set to
//! simulate a client that disconnects after a number of events.
//!
//! # Security Note
//!
//! Uses `.expect()` on lock operations which will panic if locks are
//! poisoned. Intended for tests and single-turn batch collection only.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::domain::conversation::AgentEvent;
use crate::ports::EventSink;

/// Collects events in memory.
///
/// # Example
///
/// ```ignore
/// let sink = Arc::new(CollectingEventSink::new());
/// orchestrator.run(request, Some(sink.clone())).await;
/// assert!(sink.has_event("final"));
/// ```
#[derive(Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<AgentEvent>>,
    closed: AtomicBool,
    /// Closes itself once this many events were accepted.
    capacity: Option<usize>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that disconnects after accepting `capacity` events.
    pub fn disconnecting_after(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    // === Test Helpers ===

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .read()
            .expect("CollectingEventSink: events lock poisoned")
            .clone()
    }

    /// Wire type names of the captured events, in order.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(AgentEvent::type_name).collect()
    }

    pub fn event_count(&self) -> usize {
        self.events
            .read()
            .expect("CollectingEventSink: events lock poisoned")
            .len()
    }

    pub fn has_event(&self, type_name: &str) -> bool {
        self.event_types().iter().any(|t| *t == type_name)
    }

    /// Concatenated `text` deltas.
    pub fn streamed_text(&self) -> String {
        self.events()
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .concat()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn send(&self, event: AgentEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut events = self
            .events
            .write()
            .expect("CollectingEventSink: events write lock poisoned");
        events.push(event);
        if self.capacity.is_some_and(|cap| events.len() >= cap) {
            self.closed.store(true, Ordering::SeqCst);
        }
        true
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
