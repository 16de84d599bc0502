//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sockets_dispatched_total` (counter): upgrades handed to a socket handler, by endpoint
//! - `sockets_delegated_total` (counter): requests passed to the HTTP app, by reason
//! - `sockets_handler_failures_total` (counter): handlers that returned an error
//! - `sockets_active_sessions` (gauge): currently open socket sessions
//! - `sockets_session_duration_seconds` (histogram): socket session lifetime
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; a no-op until an exporter is installed
//! - Prometheus exporter is optional and configured separately

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Why a request went to the HTTP app instead of a socket handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateReason {
    /// No socket rule matched the path.
    NotFound,
    /// A socket rule matched the path but not the method.
    MethodNotAllowed,
    /// The matched endpoint has no bound handler.
    NoHandler,
    /// A socket rule matched but the request asked for no upgrade.
    NoUpgrade,
}

impl DelegateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelegateReason::NotFound => "not_found",
            DelegateReason::MethodNotAllowed => "method_not_allowed",
            DelegateReason::NoHandler => "no_handler",
            DelegateReason::NoUpgrade => "no_upgrade",
        }
    }
}

pub fn record_socket_dispatch(endpoint: &str) {
    counter!("sockets_dispatched_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_delegation(reason: DelegateReason, upgrade_refused: bool) {
    counter!(
        "sockets_delegated_total",
        "reason" => reason.as_str(),
        "upgrade_refused" => if upgrade_refused { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_handler_failure(endpoint: &str) {
    counter!("sockets_handler_failures_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn session_opened(active: u64) {
    gauge!("sockets_active_sessions").set(active as f64);
}

pub fn session_closed(endpoint: &str, active: u64, lifetime: Duration) {
    gauge!("sockets_active_sessions").set(active as f64);
    histogram!("sockets_session_duration_seconds", "endpoint" => endpoint.to_string())
        .record(lifetime.as_secs_f64());
}
