//! Concrete port implementations.
//!
//! `fakes` holds the in-memory test doubles for the workload-mutation ports
//! that this crate deliberately does not implement for real. The remaining
//! modules are thin real adapters for the ports that are simple
//! point-to-point protocols.

pub mod fakes;
pub mod notifier;
pub mod prometheus_observer;
pub mod recorder;
pub mod sink;
pub mod webhook;

pub use notifier::WebhookNotifier;
pub use prometheus_observer::PrometheusObserver;
pub use recorder::PrometheusRecorder;
pub use sink::TracingEventSink;
pub use webhook::HttpWebhookCaller;
