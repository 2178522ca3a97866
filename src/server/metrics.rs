use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Piazza metrics
const PREFIX: &str = "piazza";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Authentication Metrics
    pub static ref AUTH_LOGIN_ATTEMPTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_auth_login_attempts_total"), "Total login attempts"),
        &["status"]
    ).expect("Failed to create auth_login_attempts_total metric");

    pub static ref AUTH_LOGIN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_auth_login_duration_seconds"),
            "Login request duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0])
    ).expect("Failed to create auth_login_duration_seconds metric");

    // Maintenance Job Metrics
    pub static ref MAINTENANCE_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_maintenance_runs_total"),
            "Terminal maintenance job outcomes"
        ),
        &["job", "outcome"]
    ).expect("Failed to create maintenance_runs_total metric");

    pub static ref MAINTENANCE_CONTINUATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_maintenance_continuations_total"),
            "Continuation descriptors handed out by suspended jobs"
        ),
        &["job"]
    ).expect("Failed to create maintenance_continuations_total metric");

    pub static ref MAINTENANCE_ROWS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_maintenance_rows_total"),
            "Rows or files processed by completed maintenance jobs"
        ),
        &["job"]
    ).expect("Failed to create maintenance_rows_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_LOGIN_ATTEMPTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_LOGIN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(MAINTENANCE_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MAINTENANCE_CONTINUATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MAINTENANCE_ROWS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a login attempt
pub fn record_login_attempt(status: &str, duration: Duration) {
    AUTH_LOGIN_ATTEMPTS_TOTAL
        .with_label_values(&[status])
        .inc();

    AUTH_LOGIN_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record a terminal maintenance run outcome ("completed" or "failed")
pub fn record_maintenance_run(job: &str, outcome: &str) {
    MAINTENANCE_RUNS_TOTAL
        .with_label_values(&[job, outcome])
        .inc();
}

/// Record a continuation descriptor handed out by a suspended job
pub fn record_maintenance_continuation(job: &str) {
    MAINTENANCE_CONTINUATIONS_TOTAL
        .with_label_values(&[job])
        .inc();
}

/// Record rows or files processed by a completed job
pub fn record_maintenance_rows(job: &str, rows: u64) {
    MAINTENANCE_ROWS_TOTAL
        .with_label_values(&[job])
        .inc_by(rows as f64);
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
