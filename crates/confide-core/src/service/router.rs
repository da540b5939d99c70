//! `send_message` dispatch and room teardown.

use tracing::{debug, info};

use super::{Delivery, MatchService};
use crate::errors::MatchError;
use crate::ids::{ConnectionId, RoomId};
use crate::protocol::{LISTENING_TEXT, MessageMode, ServerEvent};
use crate::role::Speaker;
use crate::transport::Transport;

impl MatchService {
    /// Route a message by mode.
    ///
    /// The room check runs first: a sender with no room gets `NotInRoom`
    /// whatever the mode. The `from` label comes from the mode alone.
    pub fn route<T: Transport>(
        &mut self,
        transport: &mut T,
        conn: &ConnectionId,
        message: String,
        mode: &str,
    ) -> Result<Delivery, MatchError> {
        let room_id = self
            .participants
            .get(conn)
            .ok_or(MatchError::UnknownConnection)?
            .room
            .clone()
            .ok_or(MatchError::NotInRoom)?;
        let mode: MessageMode = mode.parse()?;

        match mode {
            MessageMode::Solo => Ok(self.burn(transport, conn, room_id)),
            MessageMode::Listening => Ok(relay(
                transport,
                conn,
                room_id,
                Speaker::Listener,
                LISTENING_TEXT.to_owned(),
            )),
            MessageMode::Normal => Ok(relay(transport, conn, room_id, Speaker::Confessor, message)),
        }
    }

    /// Release every member of `room` other than `except`.
    ///
    /// Each released member leaves the group and loses its room. Returns the
    /// number released.
    pub fn teardown<T: Transport>(
        &mut self,
        transport: &mut T,
        room_id: &RoomId,
        except: Option<&ConnectionId>,
    ) -> usize {
        let mut released = 0;
        for member in transport.members(room_id) {
            if except == Some(&member) {
                continue;
            }
            self.release(transport, &member, room_id);
            released += 1;
        }
        debug!(room_id = %room_id, released, "room torn down");
        released
    }

    /// Take one connection out of a room.
    pub(super) fn release<T: Transport>(
        &mut self,
        transport: &mut T,
        conn: &ConnectionId,
        room_id: &RoomId,
    ) {
        transport.leave(conn, room_id);
        let held = match self.participants.get_mut(conn) {
            Some(p) if p.room.as_ref() == Some(room_id) => {
                p.room = None;
                true
            }
            _ => false,
        };
        if held {
            self.vacate(room_id);
        }
    }

    fn burn<T: Transport>(
        &mut self,
        transport: &mut T,
        conn: &ConnectionId,
        room_id: RoomId,
    ) -> Delivery {
        transport.emit(conn, ServerEvent::BurnConfession);
        let _ = transport.broadcast_except(&room_id, conn, &ServerEvent::ConfessionBurned);
        let mut released = self.teardown(transport, &room_id, Some(conn));
        self.release(transport, conn, &room_id);
        released += 1;
        info!(room_id = %room_id, conn_id = %conn, released, "confession burned");
        Delivery::Burned { room_id, released }
    }
}

fn relay<T: Transport>(
    transport: &mut T,
    conn: &ConnectionId,
    room_id: RoomId,
    from: Speaker,
    message: String,
) -> Delivery {
    let recipients =
        transport.broadcast_except(&room_id, conn, &ServerEvent::ReceiveMessage { from, message });
    debug!(room_id = %room_id, conn_id = %conn, ?from, recipients, "message relayed");
    Delivery::Relayed {
        room_id,
        from,
        recipients,
    }
}
