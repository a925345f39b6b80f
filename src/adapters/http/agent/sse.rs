//! Server-Sent Events transport for streamed turns.
//!
//! Each [`AgentEvent`] becomes one `data: <json>` frame. The stream ends when
//! the orchestrator closes the sink after `final` or `error`. After a
//! retryable `tool_error` the sink stays open, so the stream is held until
//! the client disconnects or the handler's hold timeout closes the sink.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::domain::conversation::AgentEvent;
use crate::ports::EventSink;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Convert the turn's event channel to an SSE response.
///
/// `sink` is the sending half's owner; holding it here keeps the channel
/// open until the sink is closed or the client disconnects.
pub fn event_stream(
    receiver: mpsc::Receiver<AgentEvent>,
    sink: Arc<dyn EventSink>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = ReceiverStream::new(receiver).filter_map(move |event| {
        let _held = &sink;
        to_sse_event(&event).map(Ok)
    });

    Sse::new(frames).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
}

fn to_sse_event(event: &AgentEvent) -> Option<Event> {
    match event.to_json() {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            tracing::error!(error = %e, event = event.type_name(), "Failed to serialize event");
            None
        }
    }
}
