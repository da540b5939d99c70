//! Role selection and pairing.

use tracing::{debug, info};

use super::{MatchService, Pairing};
use crate::errors::MatchError;
use crate::ids::{ConnectionId, RoomId};
use crate::protocol::ServerEvent;
use crate::role::Role;
use crate::transport::Transport;

impl MatchService {
    /// Parse a role name and enqueue under it.
    ///
    /// Returns the parsed role with any pairings that followed.
    pub fn select_role<T: Transport>(
        &mut self,
        transport: &mut T,
        conn: &ConnectionId,
        role: &str,
    ) -> Result<(Role, Vec<Pairing>), MatchError> {
        let role: Role = role.parse()?;
        let pairings = self.enqueue(transport, conn, role)?;
        Ok((role, pairings))
    }

    /// Append a connection to its role's queue, then pair whoever can be paired.
    ///
    /// A connection may wait in at most one queue, may not queue while in a
    /// room, and keeps the role it first chose.
    pub fn enqueue<T: Transport>(
        &mut self,
        transport: &mut T,
        conn: &ConnectionId,
        role: Role,
    ) -> Result<Vec<Pairing>, MatchError> {
        let participant = self
            .participants
            .get_mut(conn)
            .ok_or(MatchError::UnknownConnection)?;
        if participant.room.is_some() {
            return Err(MatchError::AlreadyInRoom);
        }
        if participant.queued {
            return Err(MatchError::AlreadyQueued);
        }
        match participant.role {
            Some(current) if current != role => return Err(MatchError::RoleLocked { current }),
            _ => {}
        }

        participant.role = Some(role);
        participant.queued = true;
        self.queues.push(role, conn.clone());
        debug!(
            conn_id = %conn,
            role = %role,
            waiting = self.queues.len(role),
            "joined queue"
        );

        Ok(self.pair_waiting(transport))
    }

    /// Pair queue heads until one queue is empty.
    ///
    /// Each pair gets a fresh room; both members join its group before either
    /// is told, and each is told its own role.
    pub fn pair_waiting<T: Transport>(&mut self, transport: &mut T) -> Vec<Pairing> {
        let mut pairings = Vec::new();
        while let Some((confessor, listener)) = self.queues.pop_pair() {
            let room_id = RoomId::new();
            let sides = [(&confessor, Role::Confessor), (&listener, Role::Listener)];

            for (conn, _) in sides {
                transport.join(conn, &room_id);
                if let Some(p) = self.participants.get_mut(conn) {
                    p.room = Some(room_id.clone());
                    p.queued = false;
                    self.occupy(&room_id);
                }
            }
            for (conn, role) in sides {
                transport.emit(
                    conn,
                    ServerEvent::Matched {
                        role,
                        room_id: room_id.clone(),
                    },
                );
            }

            info!(
                room_id = %room_id,
                confessor = %confessor,
                listener = %listener,
                "participants matched"
            );
            pairings.push(Pairing {
                room_id,
                confessor,
                listener,
            });
        }
        pairings
    }
}
