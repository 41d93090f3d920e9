//! Telemetry sink
//!
//! Named events with a property map, fire-and-forget. Sink failures must
//! never affect a transaction outcome, so the contract is infallible and
//! implementations swallow their own errors.

use std::fmt::Debug;

pub trait TelemetrySink: Send + Sync {
    fn track(&self, event: &str, props: &[(&str, String)]);
}

/// Writes events to the `telemetry` tracing target.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn track(&self, event: &str, props: &[(&str, String)]) {
        tracing::info!(target: "telemetry", event, ?props);
    }
}

/// Discards everything. Used in tests and minimal CLI commands.
#[derive(Debug, Default, Clone)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn track(&self, _event: &str, _props: &[(&str, String)]) {}
}
