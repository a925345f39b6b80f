//! Event Sink Port - Output channel for one turn's events.
//!
//! Exactly one producer writes to a sink per turn. Once the consumer goes
//! away or the sink is closed, sends become no-ops that report `false`, so
//! the producer can stop early without treating it as an error.

use async_trait::async_trait;

use crate::domain::conversation::AgentEvent;

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers one event. Returns `false` if the sink is closed.
    async fn send(&self, event: AgentEvent) -> bool;

    /// Marks the sink closed. Later sends are dropped.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
