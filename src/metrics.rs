use lazy_static::lazy_static;
use prometheus::{register_counter, register_histogram, Counter, Histogram};

lazy_static! {
    pub static ref GATE_REQUESTS_TOTAL: Counter = register_counter!(
        "gate_requests_total",
        "Total requests seen by the throttle gate"
    )
    .unwrap();
    pub static ref GATE_THROTTLED_TOTAL: Counter = register_counter!(
        "gate_throttled_total",
        "Requests rejected with 429"
    )
    .unwrap();
    pub static ref GATE_FAIL_OPEN_TOTAL: Counter = register_counter!(
        "gate_fail_open_total",
        "Requests admitted because the kv store was unavailable"
    )
    .unwrap();
    pub static ref GATE_PROXY_LATENCY: Histogram = register_histogram!(
        "gate_proxy_latency_seconds",
        "Origin round-trip latency in seconds"
    )
    .unwrap();
    pub static ref SYNC_RUNS_TOTAL: Counter = register_counter!(
        "sync_runs_total",
        "Completed sync runs"
    )
    .unwrap();
    pub static ref SYNC_UNIT_FAILURES_TOTAL: Counter = register_counter!(
        "sync_unit_failures_total",
        "Sync units that exhausted their retry budget"
    )
    .unwrap();
}
