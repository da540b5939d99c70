//! Directory of live connections and per-connection delivery.

use std::collections::HashMap;
use std::sync::Arc;

use confide_core::{ConnectionId, ServerEvent};
use metrics::counter;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::WS_SEND_DROPS_TOTAL;

/// Connected clients indexed by connection ID.
///
/// Lookups and sends are synchronous so the hub can deliver without
/// awaiting; a send only ever enqueues onto the connection's bounded channel.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self
            .connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.write().remove(id)
    }

    /// Look up a connection.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().get(id).cloned()
    }

    /// Deliver one event to one connection.
    ///
    /// Unknown connections are a silent no-op; a full or closed channel is
    /// logged and counted.
    pub fn send_to(&self, id: &ConnectionId, event: &ServerEvent) -> bool {
        let Some(conn) = self.get(id) else {
            debug!(conn_id = %id, event_type = event.event_type(), "emit to departed connection dropped");
            return false;
        };
        if conn.send_event(event) {
            true
        } else {
            counter!(WS_SEND_DROPS_TOTAL).increment(1);
            warn!(
                conn_id = %id,
                event_type = event.event_type(),
                dropped = conn.drop_count(),
                "failed to enqueue event (channel full or closed)"
            );
            false
        }
    }

    /// Number of active connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
