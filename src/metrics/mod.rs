//! Prometheus metrics for the webhook service.
//!
//! - Event metrics (received events by kind and outcome)
//! - Persistence metrics (stored, skipped, rolled back)
//! - Push metrics (enqueued, suppressed, results, send latency, queue depth)

mod helpers;

pub use helpers::{encode_metrics, EventMetrics, PersistenceMetrics, PushMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "pushhook";

lazy_static! {
    // ============================================================================
    // Event Metrics
    // ============================================================================

    /// Inbound events by kind and outcome
    pub static ref EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_events_total", METRIC_PREFIX),
        "Total webhook events handled",
        &["event", "outcome"]
    ).unwrap();

    // ============================================================================
    // Persistence Metrics
    // ============================================================================

    pub static ref MESSAGES_PERSISTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_persisted_total", METRIC_PREFIX),
        "Total messages committed to message storage"
    ).unwrap();

    /// Messages acknowledged without storage (sync_once / no_persist)
    pub static ref MESSAGES_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_skipped_total", METRIC_PREFIX),
        "Total messages not persisted due to header flags"
    ).unwrap();

    pub static ref BATCH_ROLLBACKS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_batch_rollbacks_total", METRIC_PREFIX),
        "Total message batches rolled back"
    ).unwrap();

    // ============================================================================
    // Push Metrics
    // ============================================================================

    pub static ref PUSH_JOBS_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_jobs_enqueued_total", METRIC_PREFIX),
        "Total push jobs handed to the worker pool"
    ).unwrap();

    /// Recipients skipped by notice/mute settings
    pub static ref PUSH_SUPPRESSED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_suppressed_total", METRIC_PREFIX),
        "Total recipients suppressed by notification settings"
    ).unwrap();

    /// Worker results: sent, no_device, unsupported_device, payload_error, send_error, timeout, lookup_error
    pub static ref PUSH_RESULTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_push_results_total", METRIC_PREFIX),
        "Push job results by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref PUSH_SEND_LATENCY: Histogram = register_histogram!(
        format!("{}_push_send_latency_seconds", METRIC_PREFIX),
        "Vendor send latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    pub static ref PUSH_QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_push_queue_depth", METRIC_PREFIX),
        "Push jobs waiting in the worker queue"
    ).unwrap();
}
