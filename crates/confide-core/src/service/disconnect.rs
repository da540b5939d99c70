//! Cleanup when a connection drops.

use tracing::info;

use super::{Departure, MatchService};
use crate::ids::ConnectionId;
use crate::protocol::ServerEvent;
use crate::transport::Transport;

impl MatchService {
    /// Forget a connection.
    ///
    /// Drops it from whichever queue holds it. If it was in a room, the other
    /// members are told and released, and the connection leaves the group.
    /// No pairing runs afterwards. Returns `None` for unknown connections.
    pub fn disconnect<T: Transport>(
        &mut self,
        transport: &mut T,
        conn: &ConnectionId,
    ) -> Option<Departure> {
        let dequeued = self.queues.remove(conn);
        let participant = self.participants.remove(conn)?;

        let mut notified = 0;
        if let Some(room_id) = &participant.room {
            notified =
                transport.broadcast_except(room_id, conn, &ServerEvent::ParticipantDisconnected);
            let _ = self.teardown(transport, room_id, Some(conn));
            transport.leave(conn, room_id);
            self.vacate(room_id);
        }

        info!(
            conn_id = %conn,
            role = ?participant.role,
            was_queued = dequeued.is_some(),
            room_id = ?participant.room,
            notified,
            "participant departed"
        );
        Some(Departure {
            role: participant.role,
            was_queued: dequeued.is_some(),
            room_id: participant.room,
            notified,
        })
    }
}
