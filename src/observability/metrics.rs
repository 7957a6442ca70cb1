//! Metrics collection and exposition.
//!
//! # Metrics
//! - `urlfetch_requests_total` (counter): requests by method and status
//! - `urlfetch_request_duration_seconds` (histogram): time to response head
//! - `urlfetch_auth_failures_total` (counter): rejected shared secrets
//! - `urlfetch_upstream_errors_total` (counter): failed round trips
//!
//! Updates go through the `metrics` facade and are no-ops until an exporter
//! is installed.

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::StatusCode;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with a scrape endpoint on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: StatusCode, start_time: Instant) {
    counter!(
        "urlfetch_requests_total",
        "method" => method.to_string(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    histogram!("urlfetch_request_duration_seconds").record(start_time.elapsed().as_secs_f64());
}

pub fn record_auth_failure() {
    counter!("urlfetch_auth_failures_total").increment(1);
}

pub fn record_upstream_error() {
    counter!("urlfetch_upstream_errors_total").increment(1);
}
