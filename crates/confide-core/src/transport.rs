//! The seam between the service and whatever carries its events.
//!
//! A [`Transport`] supplies the two capabilities the service needs: emitting
//! an event to one connection, and group membership (join, leave, list) keyed
//! by [`RoomId`]. [`GroupTable`] is a plain in-memory membership table that
//! transports can embed.

use std::collections::HashMap;

use crate::ids::{ConnectionId, RoomId};
use crate::protocol::ServerEvent;

/// Event delivery and room-group membership.
///
/// Emitting to a connection that is gone must be a silent no-op.
pub trait Transport {
    /// Deliver an event to one connection.
    fn emit(&mut self, to: &ConnectionId, event: ServerEvent);

    /// Add a connection to a room's group.
    fn join(&mut self, conn: &ConnectionId, room: &RoomId);

    /// Remove a connection from a room's group.
    fn leave(&mut self, conn: &ConnectionId, room: &RoomId);

    /// Current members of a room's group.
    fn members(&self, room: &RoomId) -> Vec<ConnectionId>;

    /// Emit to every group member except `except`. Returns the recipient count.
    fn broadcast_except(
        &mut self,
        room: &RoomId,
        except: &ConnectionId,
        event: &ServerEvent,
    ) -> usize {
        let recipients: Vec<ConnectionId> = self
            .members(room)
            .into_iter()
            .filter(|m| m != except)
            .collect();
        for member in &recipients {
            self.emit(member, event.clone());
        }
        recipients.len()
    }
}

/// In-memory room → members table.
///
/// Members are kept in join order. Empty groups are dropped.
#[derive(Debug, Default)]
pub struct GroupTable {
    groups: HashMap<RoomId, Vec<ConnectionId>>,
}

impl GroupTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Joining twice is a no-op.
    pub fn join(&mut self, conn: &ConnectionId, room: &RoomId) {
        let members = self.groups.entry(room.clone()).or_default();
        if !members.contains(conn) {
            members.push(conn.clone());
        }
    }

    /// Remove a member, dropping the group once empty.
    pub fn leave(&mut self, conn: &ConnectionId, room: &RoomId) {
        if let Some(members) = self.groups.get_mut(room) {
            members.retain(|m| m != conn);
            if members.is_empty() {
                let _ = self.groups.remove(room);
            }
        }
    }

    /// Members of a group, empty if the group does not exist.
    pub fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.groups.get(room).cloned().unwrap_or_default()
    }

    /// Whether `conn` is in `room`.
    pub fn contains(&self, conn: &ConnectionId, room: &RoomId) -> bool {
        self.groups.get(room).is_some_and(|m| m.contains(conn))
    }

    /// Rooms `conn` belongs to.
    pub fn rooms_of(&self, conn: &ConnectionId) -> Vec<RoomId> {
        self.groups
            .iter()
            .filter(|(_, members)| members.contains(conn))
            .map(|(room, _)| room.clone())
            .collect()
    }

    /// Number of non-empty groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
