//! Prometheus metrics for fiscal-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Remote authority calls by operation and outcome.
pub static AUTHORITY_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_authority_requests_total",
        "Total number of fiscal authority requests",
        &["operation", "outcome"] // login, last_authorized, authorize
    )
    .expect("Failed to register authority_requests_total")
});

/// Remote authority call duration by operation.
pub static AUTHORITY_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fiscal_authority_request_duration_seconds",
        "Fiscal authority request duration in seconds",
        &["operation"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register authority_request_duration")
});

/// Access ticket renewals by environment.
pub static TICKET_RENEWALS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_ticket_renewals_total",
        "Total number of access ticket renewals",
        &["environment"]
    )
    .expect("Failed to register ticket_renewals_total")
});

/// Authorized invoices by conclusive result.
pub static INVOICES_AUTHORIZED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_invoices_authorized_total",
        "Total number of invoices by authorization result",
        &["result"] // approved, rejected
    )
    .expect("Failed to register invoices_authorized_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fiscal_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&AUTHORITY_REQUESTS_TOTAL);
    Lazy::force(&AUTHORITY_REQUEST_DURATION);
    Lazy::force(&TICKET_RENEWALS_TOTAL);
    Lazy::force(&INVOICES_AUTHORIZED_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
