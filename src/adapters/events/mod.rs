//! Event sink adapters.
//!
//! - `ChannelEventSink` - tokio channel feeding the SSE transport
//! - `CollectingEventSink` - In-memory capture for tests and batch turns

mod channel;
mod in_memory;

pub use channel::ChannelEventSink;
pub use in_memory::CollectingEventSink;
