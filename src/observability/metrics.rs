//! Metrics collection.
//!
//! # Metrics
//! - `http_requests_total` (counter): exchanges by method, status, route
//! - `http_request_duration_seconds` (histogram): dispatch latency
//! - `http_protocol_errors_total` (counter): malformed requests by kind
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; no exporter is installed here
//!   (serverless mode has no socket to expose one), an embedding
//!   application may install a recorder
//! - Route label is the URI template, never the raw path, to bound
//!   cardinality

use std::time::Instant;

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    ::metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    ::metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_protocol_error(kind: &'static str) {
    ::metrics::counter!("http_protocol_errors_total", "kind" => kind).increment(1);
}
