//! [`EventSink`] that writes through `tracing`, treating each recorded
//! event as a structured log line.

use crate::crd::CanaryId;
use crate::ports::{EventSink, Severity};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn record(&self, canary: &CanaryId, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!(canary = %canary, "{message}"),
            Severity::Warning => warn!(canary = %canary, "{message}"),
            Severity::Error => error!(canary = %canary, "{message}"),
        }
    }
}
