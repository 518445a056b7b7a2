//! Prometheus metrics for the autotagger
//!
//! Counters for handled events, GraphQL requests and retries, exposed by the
//! webhook receiver on `/metrics`.

use lazy_static::lazy_static;
use prometheus::{register_counter, register_counter_vec, Counter, CounterVec, Encoder, TextEncoder};

lazy_static! {
    /// Counter: handled events by final status
    pub static ref EVENTS: CounterVec = register_counter_vec!(
        "autotag_events_total",
        "Handled webhook events by status",
        &["status"]
    )
    .expect("Failed to create events metric");

    /// Counter: GraphQL operations started
    pub static ref GRAPHQL_REQUESTS: CounterVec = register_counter_vec!(
        "autotag_graphql_requests_total",
        "GraphQL operations by name",
        &["operation"]
    )
    .expect("Failed to create graphql_requests metric");

    /// Counter: failed GraphQL attempts (each retry counts)
    pub static ref GRAPHQL_FAILURES: Counter = register_counter!(
        "autotag_graphql_failures_total",
        "Failed GraphQL attempts"
    )
    .expect("Failed to create graphql_failures metric");

    /// Counter: retries scheduled after a failed attempt
    pub static ref RETRIES: Counter = register_counter!(
        "autotag_retries_total",
        "Retries scheduled after a failed GraphQL attempt"
    )
    .expect("Failed to create retries metric");
}

/// Record a handled event (`updated`, `skipped` or `failed`)
pub fn record_event(status: &str) {
    EVENTS.with_label_values(&[status]).inc();
}

/// Record the start of a GraphQL operation
pub fn record_graphql_request(operation: &str) {
    GRAPHQL_REQUESTS.with_label_values(&[operation]).inc();
}

/// Record one failed attempt
pub fn record_graphql_failure() {
    GRAPHQL_FAILURES.inc();
}

/// Record a scheduled retry
pub fn record_retry() {
    RETRIES.inc();
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> crate::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::AutotagError::Other(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::AutotagError::Other(format!("Metrics are not UTF-8: {}", e)))
}
