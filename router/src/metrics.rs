//! Prometheus metrics for the routing service

use crate::error::{Result, RouterError};
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All routing-service metrics
pub struct Metrics {
    /// Envelopes accepted on POST /send
    pub messages_ingested: Counter,

    /// Envelopes routed to a terminal state (by outcome label)
    pub messages_routed: CounterVec,

    /// Messages acked-and-dropped (by reason)
    pub messages_dropped: CounterVec,

    /// Messages nacked back to the broker
    pub messages_nacked: Counter,

    /// Stored envelopes returned to recipients on GET /messages
    pub backlog_drained: Counter,

    /// Current pipeline worker count
    pub pipeline_workers: Gauge,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            messages_ingested: register_counter!(
                "reitti_messages_ingested_total",
                "Envelopes accepted for routing"
            )
            .map_err(|e| RouterError::Metrics(format!("messages_ingested: {e}")))?,

            messages_routed: register_counter_vec!(
                "reitti_messages_routed_total",
                "Envelopes routed to a terminal state",
                &["outcome"]
            )
            .map_err(|e| RouterError::Metrics(format!("messages_routed: {e}")))?,

            messages_dropped: register_counter_vec!(
                "reitti_messages_dropped_total",
                "Messages acked and dropped",
                &["reason"]
            )
            .map_err(|e| RouterError::Metrics(format!("messages_dropped: {e}")))?,

            messages_nacked: register_counter!(
                "reitti_messages_nacked_total",
                "Messages returned to the broker for redelivery"
            )
            .map_err(|e| RouterError::Metrics(format!("messages_nacked: {e}")))?,

            backlog_drained: register_counter!(
                "reitti_backlog_drained_total",
                "Stored envelopes returned to recipients"
            )
            .map_err(|e| RouterError::Metrics(format!("backlog_drained: {e}")))?,

            pipeline_workers: register_gauge!(
                "reitti_pipeline_workers",
                "Current pipeline worker count"
            )
            .map_err(|e| RouterError::Metrics(format!("pipeline_workers: {e}")))?,
        };

        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| RouterError::Metrics("failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance, if initialized
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }
}

/// Gather all metrics and encode as Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

/// Record an accepted envelope if metrics are initialized
pub fn try_record_ingested(count: u64) {
    if let Some(m) = Metrics::get() {
        m.messages_ingested.inc_by(count as f64);
    }
}

/// Record a terminal routing outcome if metrics are initialized
pub fn try_record_routed(outcome: &str) {
    if let Some(m) = Metrics::get() {
        m.messages_routed.with_label_values(&[outcome]).inc();
    }
}

/// Record a dropped message if metrics are initialized
pub fn try_record_dropped(reason: &str, count: u64) {
    if let Some(m) = Metrics::get() {
        m.messages_dropped
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }
}

/// Record a nacked message if metrics are initialized
pub fn try_record_nacked(count: u64) {
    if let Some(m) = Metrics::get() {
        m.messages_nacked.inc_by(count as f64);
    }
}

/// Record drained backlog envelopes if metrics are initialized
pub fn try_record_drained(count: u64) {
    if let Some(m) = Metrics::get() {
        m.backlog_drained.inc_by(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        // init() may race with other tests; get() must work after any
        // successful init.
        let _ = Metrics::init();
        if let Some(metrics) = Metrics::get() {
            metrics.messages_ingested.inc();
            metrics.messages_routed.with_label_values(&["delivered"]).inc();
            metrics.pipeline_workers.set(10.0);
        }
        assert!(gather().contains("reitti_"));
    }
}
