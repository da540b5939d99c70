//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Build a handle without installing it globally.
///
/// `/metrics` renders empty output; used by tests and embedders that
/// install their own recorder.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrades refused at the connection limit (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Connection lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Outbound frames dropped on a full or closed queue (counter).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
/// Pairings made (counter).
pub const MATCHES_TOTAL: &str = "matches_total";
/// Messages relayed (counter, labels: from).
pub const MESSAGES_RELAYED_TOTAL: &str = "messages_relayed_total";
/// Rooms burned by a solo message (counter).
pub const CONFESSIONS_BURNED_TOTAL: &str = "confessions_burned_total";
/// Rooms ended by a disconnect (counter).
pub const ROOMS_ABANDONED_TOTAL: &str = "rooms_abandoned_total";
/// Rejected client events (counter, labels: kind).
pub const EVENTS_REJECTED_TOTAL: &str = "events_rejected_total";
/// Connections waiting for a partner (gauge, labels: role).
pub const QUEUE_WAITING: &str = "queue_waiting";
/// Rooms currently open (gauge).
pub const ROOMS_ACTIVE: &str = "rooms_active";
