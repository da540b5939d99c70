//! Test utilities for driving [`MatchService`](crate::MatchService) without a
//! network.
//!
//! Provides a [`RecordingTransport`] that keeps group membership in memory and
//! records every emitted event for assertions.

use std::collections::HashSet;

use crate::ids::{ConnectionId, RoomId};
use crate::protocol::ServerEvent;
use crate::transport::{GroupTable, Transport};

/// In-memory transport that records emitted events in order.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    groups: GroupTable,
    sent: Vec<(ConnectionId, ServerEvent)>,
    closed: HashSet<ConnectionId>,
}

impl RecordingTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Group membership as the service left it.
    pub fn groups(&self) -> &GroupTable {
        &self.groups
    }

    /// Every recorded `(recipient, event)`, oldest first.
    pub fn sent(&self) -> &[(ConnectionId, ServerEvent)] {
        &self.sent
    }

    /// Remove and return the events recorded for one connection.
    pub fn take(&mut self, conn: &ConnectionId) -> Vec<ServerEvent> {
        let (mine, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.sent).into_iter().partition(|(to, _)| to == conn);
        self.sent = rest;
        mine.into_iter().map(|(_, ev)| ev).collect()
    }

    /// Drop everything recorded so far.
    pub fn clear(&mut self) {
        self.sent.clear();
    }

    /// Mark a connection gone; later emits to it are dropped.
    pub fn close(&mut self, conn: &ConnectionId) {
        let _ = self.closed.insert(conn.clone());
    }
}

impl Transport for RecordingTransport {
    fn emit(&mut self, to: &ConnectionId, event: ServerEvent) {
        if !self.closed.contains(to) {
            self.sent.push((to.clone(), event));
        }
    }

    fn join(&mut self, conn: &ConnectionId, room: &RoomId) {
        self.groups.join(conn, room);
    }

    fn leave(&mut self, conn: &ConnectionId, room: &RoomId) {
        self.groups.leave(conn, room);
    }

    fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.groups.members(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_only_removes_one_recipient() {
        let mut t = RecordingTransport::new();
        let (a, b) = (ConnectionId::from("a"), ConnectionId::from("b"));
        t.emit(&a, ServerEvent::BurnConfession);
        t.emit(&b, ServerEvent::ConfessionBurned);
        t.emit(&a, ServerEvent::ParticipantDisconnected);

        assert_eq!(
            t.take(&a),
            vec![ServerEvent::BurnConfession, ServerEvent::ParticipantDisconnected]
        );
        assert_eq!(t.sent().len(), 1);
    }

    #[test]
    fn closed_connections_receive_nothing() {
        let mut t = RecordingTransport::new();
        let a = ConnectionId::from("a");
        t.close(&a);
        t.emit(&a, ServerEvent::BurnConfession);
        assert!(t.sent().is_empty());
    }
}
