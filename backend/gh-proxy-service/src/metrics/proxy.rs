use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

lazy_static! {
    /// Requests served, segmented by outcome
    /// (hit, miss, rate_limited, body_too_large, upstream_error, error).
    pub static ref PROXY_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "gh_proxy_requests_total",
        "Proxied requests segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register gh_proxy_requests_total");

    /// Upstream responses, segmented by category and status code.
    pub static ref UPSTREAM_RESPONSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "gh_proxy_upstream_responses_total",
        "Upstream responses segmented by rate-limit category and status",
        &["category", "status"]
    )
    .expect("failed to register gh_proxy_upstream_responses_total");

    /// End-to-end request duration segmented by outcome.
    pub static ref PROXY_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "gh_proxy_request_duration_seconds",
        "Request duration segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register gh_proxy_request_duration_seconds");

    /// Cache rows deleted by the sweeper, segmented by reason
    /// (expired, size_cap).
    pub static ref CACHE_SWEEP_DELETED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "gh_proxy_cache_sweep_deleted_total",
        "Cached rows deleted by the janitor segmented by reason",
        &["reason"]
    )
    .expect("failed to register gh_proxy_cache_sweep_deleted_total");

    /// Request-log rows removed by the janitor trim task.
    pub static ref REQUEST_LOG_TRIMMED_TOTAL: IntCounter = register_int_counter!(
        "gh_proxy_request_log_trimmed_total",
        "Request-log rows removed by the janitor"
    )
    .expect("failed to register gh_proxy_request_log_trimmed_total");
}
