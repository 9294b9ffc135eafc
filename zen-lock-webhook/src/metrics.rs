//! Metrics sink (spec.md §4.6 "Each unsuccessful exit records a metric").
//!
//! The metrics *pipeline* is out of scope (spec.md §1); what's ambient is a
//! seam for emitting counters, stubbed here as a trait with a `tracing`-based
//! default implementation, the same way the teacher surfaces everything
//! through `tracing::info!`/`tracing::warn!` rather than a bespoke metrics
//! crate.

/// Records outcome counters labelled by namespace/bundle, per spec.md §4.6.
pub trait MetricsSink: Send + Sync {
    fn record_exit(&self, namespace: &str, bundle: &str, outcome: &str);
    fn record_success(&self, namespace: &str, bundle: &str, duration: std::time::Duration);
}

/// Default sink: every counter becomes a structured `tracing` event.
#[derive(Default)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record_exit(&self, namespace: &str, bundle: &str, outcome: &str) {
        tracing::info!(namespace, bundle, outcome, "admission exit");
    }

    fn record_success(&self, namespace: &str, bundle: &str, duration: std::time::Duration) {
        tracing::info!(namespace, bundle, duration_ms = duration.as_millis() as u64, "admission succeeded");
    }
}
