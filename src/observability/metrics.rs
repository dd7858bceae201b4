//! Metrics collection and exposition.
//!
//! # Metrics
//! - `circuit_breaker_requests_total` (counter): calls by breaker, outcome
//!   (success, failure, timeout, ignored, rejected)
//! - `circuit_breaker_transitions_total` (counter): state changes by breaker, from, to
//! - `circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `circuit_breaker_healthy` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; no-ops until a recorder is installed
//! - Prometheus exporter is opt-in via `observability.metrics_enabled`

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::breaker::CircuitState;

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(breaker: &str, outcome: &'static str) {
    metrics::counter!(
        "circuit_breaker_requests_total",
        "breaker" => breaker.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_transition(breaker: &str, from: CircuitState, to: CircuitState) {
    metrics::counter!(
        "circuit_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_state(breaker, to);
}

pub fn record_state(breaker: &str, state: CircuitState) {
    metrics::gauge!("circuit_breaker_state", "breaker" => breaker.to_string())
        .set(state.gauge_value());
}

pub fn record_health(breaker: &str, healthy: bool) {
    metrics::gauge!("circuit_breaker_healthy", "breaker" => breaker.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
