//! Channel-backed event sink used by the streaming HTTP endpoint.
//!
//! The receiving half is handed to the transport. When the transport drops
//! it (client disconnect), further sends fail and the sink marks itself
//! closed, turning later writes into no-ops.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::domain::conversation::AgentEvent;
use crate::ports::EventSink;

pub struct ChannelEventSink {
    sender: Mutex<Option<mpsc::Sender<AgentEvent>>>,
    closed: AtomicBool,
}

impl ChannelEventSink {
    /// Creates a sink and the receiver the transport reads from.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let sink = Self {
            sender: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
        };
        (sink, rx)
    }

    fn current_sender(&self) -> Option<mpsc::Sender<AgentEvent>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn send(&self, event: AgentEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        let Some(sender) = self.current_sender() else {
            return false;
        };
        if sender.send(event).await.is_err() {
            tracing::debug!("Event receiver dropped, closing sink");
            self.close();
            return false;
        }
        true
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the sender ends the receiver's stream.
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_events_in_order() {
        let (sink, mut rx) = ChannelEventSink::new(8);

        assert!(sink.send(AgentEvent::Typing).await);
        assert!(sink.send(AgentEvent::Final { response: "done".into() }).await);

        assert_eq!(rx.recv().await, Some(AgentEvent::Typing));
        assert_eq!(rx.recv().await, Some(AgentEvent::Final { response: "done".into() }));
    }

    #[tokio::test]
    async fn close_ends_the_receiver_stream() {
        let (sink, mut rx) = ChannelEventSink::new(8);
        sink.close();

        assert!(sink.is_closed());
        assert!(!sink.send(AgentEvent::Typing).await);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_receiver_turns_sends_into_noops() {
        let (sink, rx) = ChannelEventSink::new(8);
        drop(rx);

        assert!(!sink.send(AgentEvent::Typing).await);
        assert!(sink.is_closed());
        assert!(!sink.send(AgentEvent::Typing).await);
    }
}
