// ============================================================================
// PROMETHEUS METRICS
// ============================================================================
// Counters for the HTTP surface and the cache-and-contention core.
// ============================================================================

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};

lazy_static! {
    // ========================================================================
    // HTTP REQUEST METRICS
    // ========================================================================

    /// Total HTTP requests by method, endpoint and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "endpoint", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "endpoint"],
        vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0]
    )
    .unwrap();

    // ========================================================================
    // CACHE METRICS
    // ========================================================================

    /// Cache-aside lookups by strategy and outcome
    pub static ref CACHE_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_lookups_total",
        "Cache-aside lookups by strategy and outcome",
        &["strategy", "outcome"]
    )
    .unwrap();

    /// Backing-store rebuilds by strategy and status
    pub static ref CACHE_REBUILDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_rebuilds_total",
        "Cache rebuilds from the backing store",
        &["strategy", "status"]
    )
    .unwrap();

    // ========================================================================
    // LOCK & ID METRICS
    // ========================================================================

    pub static ref LOCK_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "distributed_lock_operations_total",
        "Distributed lock acquire/release attempts",
        &["operation", "result"]
    )
    .unwrap();

    pub static ref IDS_GENERATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ids_generated_total",
        "Unique ids handed out per sequence",
        &["sequence"]
    )
    .unwrap();

    // ========================================================================
    // SECKILL METRICS
    // ========================================================================

    /// Admission decisions (ok, stock_empty, limit_exceeded, not_started, ended, busy)
    pub static ref SECKILL_ADMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "seckill_admissions_total",
        "Seckill admission decisions",
        &["outcome"]
    )
    .unwrap();

    /// Order processor outcomes. Anything other than "persisted" is cache/store drift.
    pub static ref SECKILL_ORDERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "seckill_orders_total",
        "Order intents consumed by the order processor",
        &["outcome"]
    )
    .unwrap();

    pub static ref SECKILL_QUEUE_DEPTH: IntGauge = register_int_gauge!(
        "seckill_queue_depth",
        "Order intents waiting for the order processor"
    )
    .unwrap();
}

/// Record one HTTP request
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(duration_secs);
}

pub fn record_cache_lookup(strategy: &str, outcome: &str) {
    CACHE_LOOKUPS_TOTAL
        .with_label_values(&[strategy, outcome])
        .inc();
}

pub fn record_cache_rebuild(strategy: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    CACHE_REBUILDS_TOTAL
        .with_label_values(&[strategy, status])
        .inc();
}

pub fn record_lock_operation(operation: &str, success: bool) {
    let result = if success { "ok" } else { "rejected" };
    LOCK_OPERATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}

pub fn record_id_generated(sequence: &str) {
    IDS_GENERATED_TOTAL.with_label_values(&[sequence]).inc();
}

pub fn record_seckill_admission(outcome: &str) {
    SECKILL_ADMISSIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_seckill_order(outcome: &str) {
    SECKILL_ORDERS_TOTAL.with_label_values(&[outcome]).inc();
}
