//! Telemetry adapters.
//!
//! - `TracingTelemetry` - Emits each event as a structured `tracing` line
//!   on the `telemetry` target, for a log shipper to collect
//! - `NoOpTelemetry` - Discards events
//! - `RecordingTelemetry` - Keeps events in memory for assertions

use std::sync::{Arc, Mutex};

use crate::ports::{TelemetryEvent, TelemetrySink};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        let keys = event.keys();
        let payload = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize telemetry event");
                return;
            }
        };
        tracing::info!(
            target: "telemetry",
            event = event.name(),
            correlation_id = %keys.correlation_id,
            session_id = %keys.session_id,
            team_id = %keys.team_id,
            payload = %payload,
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTelemetry;

impl TelemetrySink for NoOpTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}

#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Names of the recorded events, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(TelemetryEvent::name).collect()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record(&self, event: TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
