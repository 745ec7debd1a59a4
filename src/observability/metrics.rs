//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_backend_calls_total` (counter): backend calls by procedure, code

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tonic::Code;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("gateway_requests_total", "HTTP requests handled");
    describe_histogram!(
        "gateway_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!("gateway_backend_calls_total", "Calls made to the backend");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished HTTP request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one backend call outcome.
pub fn record_backend_call(procedure: &str, code: Code) {
    counter!(
        "gateway_backend_calls_total",
        "procedure" => procedure.to_string(),
        "code" => format!("{:?}", code)
    )
    .increment(1);
}
