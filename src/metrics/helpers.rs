//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BATCH_ROLLBACKS_TOTAL, EVENTS_TOTAL, MESSAGES_PERSISTED_TOTAL, MESSAGES_SKIPPED_TOTAL,
    PUSH_JOBS_ENQUEUED_TOTAL, PUSH_QUEUE_DEPTH, PUSH_RESULTS_TOTAL, PUSH_SEND_LATENCY,
    PUSH_SUPPRESSED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

pub struct EventMetrics;

impl EventMetrics {
    pub fn record_success(event: &str) {
        EVENTS_TOTAL.with_label_values(&[event, "success"]).inc();
    }

    pub fn record_failure(event: &str) {
        EVENTS_TOTAL.with_label_values(&[event, "failure"]).inc();
    }
}

pub struct PersistenceMetrics;

impl PersistenceMetrics {
    pub fn record_persisted(count: u64) {
        MESSAGES_PERSISTED_TOTAL.inc_by(count);
    }

    pub fn record_skipped() {
        MESSAGES_SKIPPED_TOTAL.inc();
    }

    pub fn record_rollback() {
        BATCH_ROLLBACKS_TOTAL.inc();
    }
}

pub struct PushMetrics;

impl PushMetrics {
    pub fn record_enqueued() {
        PUSH_JOBS_ENQUEUED_TOTAL.inc();
    }

    /// Jobs currently waiting, as read from the channel
    pub fn record_queue_depth(depth: usize) {
        PUSH_QUEUE_DEPTH.set(depth as i64);
    }

    pub fn record_suppressed(count: u64) {
        PUSH_SUPPRESSED_TOTAL.inc_by(count);
    }

    pub fn record_result(outcome: &str) {
        PUSH_RESULTS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn record_send_latency(seconds: f64) {
        PUSH_SEND_LATENCY.observe(seconds);
    }
}
