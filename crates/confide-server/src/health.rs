//! `/health` endpoint.

use std::time::Instant;

use confide_core::Stats;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Confessors waiting for a listener.
    pub waiting_confessors: usize,
    /// Listeners waiting for a confessor.
    pub waiting_listeners: usize,
    /// Rooms currently open.
    pub active_rooms: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, stats: &Stats) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        waiting_confessors: stats.waiting_confessors,
        waiting_listeners: stats.waiting_listeners,
        active_rooms: stats.active_rooms,
    }
}
