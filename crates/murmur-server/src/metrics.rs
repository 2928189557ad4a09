//! Metrics collection and export for the Murmur relay.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "murmur_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "murmur_connections_active";
    pub const MATCHES_TOTAL: &str = "murmur_matches_total";
    pub const QUEUE_WAITING: &str = "murmur_queue_waiting";
    pub const ROOMS_ACTIVE: &str = "murmur_rooms_active";
    pub const ENVELOPES_RELAYED_TOTAL: &str = "murmur_envelopes_relayed_total";
    pub const ENVELOPES_DROPPED_TOTAL: &str = "murmur_envelopes_dropped_total";
    pub const ERRORS_TOTAL: &str = "murmur_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::MATCHES_TOTAL, "Total number of completed pairings");
    metrics::describe_gauge!(
        names::QUEUE_WAITING,
        "Current number of connections waiting in region queues"
    );
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Current number of active rooms");
    metrics::describe_counter!(
        names::ENVELOPES_RELAYED_TOTAL,
        "Total number of signaling envelopes delivered"
    );
    metrics::describe_counter!(
        names::ENVELOPES_DROPPED_TOTAL,
        "Total number of signaling envelopes dropped"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a completed pairing.
pub fn record_match() {
    counter!(names::MATCHES_TOTAL).increment(1);
}

/// Record a relayed envelope.
pub fn record_envelope(kind: &str, delivered: bool) {
    if delivered {
        counter!(names::ENVELOPES_RELAYED_TOTAL, "kind" => kind.to_string()).increment(1);
    } else {
        counter!(names::ENVELOPES_DROPPED_TOTAL, "kind" => kind.to_string()).increment(1);
    }
}

/// Update the waiting and room gauges from lobby statistics.
pub fn set_lobby_gauges(waiting: usize, rooms: usize) {
    gauge!(names::QUEUE_WAITING).set(waiting as f64);
    gauge!(names::ROOMS_ACTIVE).set(rooms as f64);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        counter!(names::CONNECTIONS_TOTAL).increment(1);
        gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_guard() {
        // Just test that it doesn't panic
        let _guard = ConnectionMetricsGuard::new();
    }
}
