//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by method, status
//! - `gate_request_duration_seconds` (histogram): time through the pipeline
//! - `gate_rate_limited_total` (counter): requests rejected with 429
//! - `gate_preflight_total` (counter): pre-flight answers by origin match
//! - `gate_auth_failures_total` (counter): rejected bearer tokens by reason
//! - `gate_rate_limit_entries` (gauge): live rate-limit store entries
//!
//! Recording is a no-op until [`init_metrics`] installs a recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("gate_requests_total", "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    histogram!("gate_request_duration_seconds", "method" => method.to_string(), "status" => status)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gate_rate_limited_total").increment(1);
}

pub fn record_preflight(origin_allowed: bool) {
    counter!("gate_preflight_total", "allowed" => origin_allowed.to_string()).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("gate_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_rate_limit_entries(count: usize) {
    gauge!("gate_rate_limit_entries").set(count as f64);
}
