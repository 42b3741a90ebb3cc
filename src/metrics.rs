use lazy_static::lazy_static;
use prometheus::{
    Gauge, Histogram, IntCounter, IntCounterVec, register_gauge, register_histogram,
    register_int_counter, register_int_counter_vec,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounter =
        register_int_counter!("codegen_requests_total", "Total generation requests").unwrap();
    pub static ref GENERATED_TOTAL: IntCounter =
        register_int_counter!("codegen_generated_total", "Requests answered with code").unwrap();
    pub static ref FAILURES: IntCounterVec = register_int_counter_vec!(
        "codegen_failures_total",
        "Failed requests by error kind",
        &["kind"]
    )
    .unwrap();
    pub static ref DENYLIST_HITS: IntCounterVec = register_int_counter_vec!(
        "codegen_denylist_hits_total",
        "Generated code rejected by denylist rule",
        &["rule"]
    )
    .unwrap();
    pub static ref MODEL_LATENCY: Histogram = register_histogram!(
        "codegen_model_latency_seconds",
        "Model call latency in seconds"
    )
    .unwrap();
    pub static ref RATE_LIMIT_KEYS: Gauge = register_gauge!(
        "codegen_rate_limit_keys",
        "Client keys tracked by the in-memory rate limiter"
    )
    .unwrap();
}
