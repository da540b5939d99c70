//! `MatchService`: the single in-memory authority for queues and rooms.
//!
//! One value per process, owned by whichever task processes transport
//! events. Every method runs to completion synchronously, so handing the
//! service one event at a time is enough to keep pairing and teardown atomic.
//!
//! - [`matchmaking`]: role selection, queueing, the pairing loop
//! - [`router`]: `send_message` dispatch and room teardown
//! - [`disconnect`]: queue and room cleanup when a connection drops

mod disconnect;
mod matchmaking;
mod router;

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::errors::MatchError;
use crate::ids::{ConnectionId, RoomId};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::queue::RoleQueues;
use crate::role::{Role, Speaker};
use crate::transport::Transport;

/// Per-connection state.
#[derive(Clone, Debug, Default)]
struct Participant {
    role: Option<Role>,
    room: Option<RoomId>,
    queued: bool,
}

/// A confessor and a listener placed in a fresh room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pairing {
    /// The new room.
    pub room_id: RoomId,
    /// Confessor side.
    pub confessor: ConnectionId,
    /// Listener side.
    pub listener: ConnectionId,
}

/// Result of routing a `send_message`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Text relayed to the other room members.
    Relayed {
        /// Room the message went to.
        room_id: RoomId,
        /// Label attached to the message.
        from: Speaker,
        /// How many members received it.
        recipients: usize,
    },
    /// The room was burned and all members released.
    Burned {
        /// The room that no longer exists.
        room_id: RoomId,
        /// How many members were released, sender included.
        released: usize,
    },
}

/// What a disconnect cleaned up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Departure {
    /// Role the connection held, if any.
    pub role: Option<Role>,
    /// Whether it was still waiting in a queue.
    pub was_queued: bool,
    /// Room it was in, if any.
    pub room_id: Option<RoomId>,
    /// How many remaining members were told.
    pub notified: usize,
}

/// Result of [`MatchService::handle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The connection joined a queue; any pairings that followed.
    Queued {
        /// The role it queued under.
        role: Role,
        /// Rooms created by the pairing step.
        pairings: Vec<Pairing>,
    },
    /// A message was relayed or the room burned.
    Delivered(Delivery),
    /// The event was rejected and the sender told why.
    Rejected(MatchError),
}

/// Point-in-time counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Known connections.
    pub connections: usize,
    /// Confessors waiting.
    pub waiting_confessors: usize,
    /// Listeners waiting.
    pub waiting_listeners: usize,
    /// Rooms with at least one member.
    pub active_rooms: usize,
}

/// Queues, participant state, and the operations over them.
#[derive(Debug, Default)]
pub struct MatchService {
    participants: HashMap<ConnectionId, Participant>,
    queues: RoleQueues,
    /// Members holding each open room.
    occupancy: HashMap<RoomId, usize>,
}

impl MatchService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. Returns `false` if it was already known.
    pub fn connect(&mut self, conn: ConnectionId) -> bool {
        if self.participants.contains_key(&conn) {
            return false;
        }
        debug!(conn_id = %conn, "participant registered");
        let _ = self.participants.insert(conn, Participant::default());
        true
    }

    /// Handle one client event, reporting any rejection to the sender.
    pub fn handle<T: Transport>(
        &mut self,
        transport: &mut T,
        conn: &ConnectionId,
        event: ClientEvent,
    ) -> Outcome {
        let result = match event {
            ClientEvent::SelectRole(role) => self
                .select_role(transport, conn, &role)
                .map(|(role, pairings)| Outcome::Queued { role, pairings }),
            ClientEvent::SendMessage(msg) => self
                .route(transport, conn, msg.message, &msg.mode)
                .map(Outcome::Delivered),
        };
        result.unwrap_or_else(|err| {
            self.reject(transport, conn, &err);
            Outcome::Rejected(err)
        })
    }

    /// Tell a sender its event was discarded.
    pub fn reject<T: Transport>(&self, transport: &mut T, conn: &ConnectionId, err: &MatchError) {
        debug!(conn_id = %conn, kind = err.kind(), error = ?err, "event rejected");
        transport.emit(conn, ServerEvent::ErrorMessage(err.to_string()));
    }

    /// Role chosen by a connection.
    pub fn role_of(&self, conn: &ConnectionId) -> Option<Role> {
        self.participants.get(conn).and_then(|p| p.role)
    }

    /// Room a connection is in.
    pub fn room_of(&self, conn: &ConnectionId) -> Option<&RoomId> {
        self.participants.get(conn).and_then(|p| p.room.as_ref())
    }

    /// Whether a connection is waiting for a partner.
    pub fn is_queued(&self, conn: &ConnectionId) -> bool {
        self.participants.get(conn).is_some_and(|p| p.queued)
    }

    /// Whether the connection is registered.
    pub fn contains(&self, conn: &ConnectionId) -> bool {
        self.participants.contains_key(conn)
    }

    /// The waiting queues.
    pub fn queues(&self) -> &RoleQueues {
        &self.queues
    }

    /// Current counters.
    pub fn stats(&self) -> Stats {
        Stats {
            connections: self.participants.len(),
            waiting_confessors: self.queues.len(Role::Confessor),
            waiting_listeners: self.queues.len(Role::Listener),
            active_rooms: self.occupancy.len(),
        }
    }

    fn occupy(&mut self, room_id: &RoomId) {
        *self.occupancy.entry(room_id.clone()).or_default() += 1;
    }

    fn vacate(&mut self, room_id: &RoomId) {
        if let Some(count) = self.occupancy.get_mut(room_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                let _ = self.occupancy.remove(room_id);
            }
        }
    }

    /// Known connection IDs, for invariant checks.
    #[cfg(test)]
    fn connection_ids(&self) -> Vec<ConnectionId> {
        self.participants.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LISTENING_TEXT, OutgoingMessage};
    use crate::test_utils::RecordingTransport;
    use assert_matches::assert_matches;

    /// Room ⇔ group membership, queue exclusivity, and two-member rooms.
    pub(super) fn assert_invariants(svc: &MatchService, t: &RecordingTransport) {
        for conn in svc.connection_ids() {
            let groups = t.groups().rooms_of(&conn);
            match svc.room_of(&conn) {
                Some(room) => {
                    assert_eq!(groups, vec![room.clone()], "{conn} room/group mismatch");
                    assert!(!svc.queues().contains(&conn), "{conn} queued while in a room");
                    assert_eq!(t.groups().members(room).len(), 2, "{room} is not two-party");
                }
                None => assert!(groups.is_empty(), "{conn} in a group without a room"),
            }
            assert_eq!(svc.is_queued(&conn), svc.queues().contains(&conn));
        }
        let rooms: std::collections::HashSet<RoomId> = svc
            .connection_ids()
            .iter()
            .filter_map(|c| svc.room_of(c).cloned())
            .collect();
        assert_eq!(svc.stats().active_rooms, rooms.len(), "room count drifted");
    }

    fn setup(names: &[&str]) -> (MatchService, RecordingTransport, Vec<ConnectionId>) {
        let mut svc = MatchService::new();
        let ids: Vec<ConnectionId> = names.iter().map(|n| ConnectionId::from(*n)).collect();
        for id in &ids {
            assert!(svc.connect(id.clone()));
        }
        (svc, RecordingTransport::new(), ids)
    }

    fn select(svc: &mut MatchService, t: &mut RecordingTransport, id: &ConnectionId, role: &str) -> Outcome {
        svc.handle(t, id, ClientEvent::SelectRole(role.into()))
    }

    fn send(svc: &mut MatchService, t: &mut RecordingTransport, id: &ConnectionId, message: &str, mode: &str) -> Outcome {
        svc.handle(
            t,
            id,
            ClientEvent::SendMessage(OutgoingMessage {
                message: message.into(),
                mode: mode.into(),
            }),
        )
    }

    /// A confessor and a listener already paired, with their inboxes drained.
    fn paired() -> (MatchService, RecordingTransport, ConnectionId, ConnectionId, RoomId) {
        let (mut svc, mut t, ids) = setup(&["a", "b"]);
        let _ = select(&mut svc, &mut t, &ids[0], "confessor");
        let _ = select(&mut svc, &mut t, &ids[1], "listener");
        let room = svc.room_of(&ids[0]).cloned().unwrap();
        let _ = t.take(&ids[0]);
        let _ = t.take(&ids[1]);
        (svc, t, ids[0].clone(), ids[1].clone(), room)
    }

    #[test]
    fn connect_twice_is_rejected() {
        let mut svc = MatchService::new();
        assert!(svc.connect(ConnectionId::from("a")));
        assert!(!svc.connect(ConnectionId::from("a")));
        assert_eq!(svc.stats().connections, 1);
    }

    #[test]
    fn confessor_and_listener_are_matched() {
        let (mut svc, mut t, ids) = setup(&["a", "b"]);
        let first = select(&mut svc, &mut t, &ids[0], "confessor");
        assert_matches!(first, Outcome::Queued { role: Role::Confessor, ref pairings } if pairings.is_empty());
        assert!(t.take(&ids[0]).is_empty());

        let second = select(&mut svc, &mut t, &ids[1], "listener");
        let Outcome::Queued { pairings, .. } = second else {
            panic!("expected Queued, got {second:?}");
        };
        assert_eq!(pairings.len(), 1);
        let room = pairings[0].room_id.clone();

        assert_eq!(
            t.take(&ids[0]),
            vec![ServerEvent::Matched { role: Role::Confessor, room_id: room.clone() }]
        );
        assert_eq!(
            t.take(&ids[1]),
            vec![ServerEvent::Matched { role: Role::Listener, room_id: room.clone() }]
        );
        assert_eq!(svc.room_of(&ids[0]), Some(&room));
        assert_eq!(svc.room_of(&ids[1]), Some(&room));
        assert!(svc.queues().is_empty());
        assert_invariants(&svc, &t);
    }

    #[test]
    fn fifo_fairness() {
        let (mut svc, mut t, ids) = setup(&["c1", "c2", "l1"]);
        let _ = select(&mut svc, &mut t, &ids[0], "confessor");
        let _ = select(&mut svc, &mut t, &ids[1], "confessor");
        let _ = select(&mut svc, &mut t, &ids[2], "listener");

        assert!(svc.room_of(&ids[0]).is_some());
        assert!(svc.room_of(&ids[1]).is_none());
        assert!(svc.is_queued(&ids[1]));
        assert_eq!(svc.room_of(&ids[0]), svc.room_of(&ids[2]));
        assert_invariants(&svc, &t);
    }

    #[test]
    fn invalid_role_is_reported() {
        let (mut svc, mut t, ids) = setup(&["a"]);
        let out = select(&mut svc, &mut t, &ids[0], "priest");
        assert_matches!(out, Outcome::Rejected(MatchError::InvalidRole(_)));
        assert_eq!(
            t.take(&ids[0]),
            vec![ServerEvent::ErrorMessage("Invalid role selected.".into())]
        );
        assert!(svc.role_of(&ids[0]).is_none());
        assert!(svc.queues().is_empty());
    }

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let (mut svc, mut t, ids) = setup(&["a"]);
        let _ = select(&mut svc, &mut t, &ids[0], "confessor");
        let out = select(&mut svc, &mut t, &ids[0], "confessor");
        assert_matches!(out, Outcome::Rejected(MatchError::AlreadyQueued));
        assert_eq!(svc.queues().len(Role::Confessor), 1);
    }

    #[test]
    fn switching_queues_is_rejected() {
        let (mut svc, mut t, ids) = setup(&["a"]);
        let _ = select(&mut svc, &mut t, &ids[0], "confessor");
        let out = select(&mut svc, &mut t, &ids[0], "listener");
        assert_matches!(out, Outcome::Rejected(MatchError::AlreadyQueued));
        assert_eq!(svc.queues().len(Role::Listener), 0);
    }

    #[test]
    fn select_role_while_in_room_is_rejected() {
        let (mut svc, mut t, a, _b, room) = paired();
        let out = select(&mut svc, &mut t, &a, "confessor");
        assert_matches!(out, Outcome::Rejected(MatchError::AlreadyInRoom));
        assert_eq!(svc.room_of(&a), Some(&room));
        assert!(svc.queues().is_empty());
        assert_invariants(&svc, &t);
    }

    #[test]
    fn unknown_connection_is_rejected() {
        let (mut svc, mut t, _ids) = setup(&[]);
        let ghost = ConnectionId::from("ghost");
        let out = select(&mut svc, &mut t, &ghost, "listener");
        assert_matches!(out, Outcome::Rejected(MatchError::UnknownConnection));
        assert!(svc.queues().is_empty());
    }

    #[test]
    fn normal_message_reaches_partner_only() {
        let (mut svc, mut t, a, b, room) = paired();
        let out = send(&mut svc, &mut t, &a, "x", "normal");
        assert_eq!(
            out,
            Outcome::Delivered(Delivery::Relayed {
                room_id: room,
                from: Speaker::Confessor,
                recipients: 1,
            })
        );
        assert_eq!(
            t.take(&b),
            vec![ServerEvent::ReceiveMessage { from: Speaker::Confessor, message: "x".into() }]
        );
        assert!(t.take(&a).is_empty());
    }

    #[test]
    fn listening_relays_fixed_text() {
        let (mut svc, mut t, a, b, _room) = paired();
        let _ = send(&mut svc, &mut t, &b, "ignored", "listening");
        assert_eq!(
            t.take(&a),
            vec![ServerEvent::ReceiveMessage {
                from: Speaker::Listener,
                message: LISTENING_TEXT.into(),
            }]
        );
        assert!(t.take(&b).is_empty());
    }

    #[test]
    fn mode_label_ignores_sender_role() {
        let (mut svc, mut t, a, b, _room) = paired();
        let _ = send(&mut svc, &mut t, &a, "", "listening");
        assert_matches!(
            t.take(&b).as_slice(),
            [ServerEvent::ReceiveMessage { from: Speaker::Listener, .. }]
        );
        let _ = send(&mut svc, &mut t, &b, "from the listener", "normal");
        assert_matches!(
            t.take(&a).as_slice(),
            [ServerEvent::ReceiveMessage { from: Speaker::Confessor, .. }]
        );
    }

    #[test]
    fn solo_burns_and_releases_both() {
        let (mut svc, mut t, a, b, room) = paired();
        let out = send(&mut svc, &mut t, &a, "", "solo");
        assert_eq!(out, Outcome::Delivered(Delivery::Burned { room_id: room.clone(), released: 2 }));

        assert_eq!(t.take(&a), vec![ServerEvent::BurnConfession]);
        assert_eq!(t.take(&b), vec![ServerEvent::ConfessionBurned]);
        assert!(svc.room_of(&a).is_none());
        assert!(svc.room_of(&b).is_none());
        assert!(!t.groups().contains(&b, &room));
        assert!(t.groups().members(&room).is_empty());
        assert_invariants(&svc, &t);
    }

    #[test]
    fn after_burn_sender_is_not_in_a_room() {
        let (mut svc, mut t, a, b, _room) = paired();
        let _ = send(&mut svc, &mut t, &a, "", "solo");
        let _ = t.take(&a);
        let _ = t.take(&b);

        let out = send(&mut svc, &mut t, &a, "hello?", "normal");
        assert_matches!(out, Outcome::Rejected(MatchError::NotInRoom));
        assert!(t.take(&b).is_empty());
    }

    #[test]
    fn released_participants_can_requeue_same_role() {
        let (mut svc, mut t, a, b, _room) = paired();
        let _ = send(&mut svc, &mut t, &a, "", "solo");
        let out = select(&mut svc, &mut t, &b, "listener");
        assert_matches!(out, Outcome::Queued { role: Role::Listener, .. });
        let out = select(&mut svc, &mut t, &a, "listener");
        assert_matches!(out, Outcome::Rejected(MatchError::RoleLocked { current: Role::Confessor }));
        let out = select(&mut svc, &mut t, &a, "confessor");
        assert_matches!(out, Outcome::Queued { ref pairings, .. } if pairings.len() == 1);
        assert_eq!(svc.room_of(&a), svc.room_of(&b));
        assert_invariants(&svc, &t);
    }

    #[test]
    fn bogus_mode_changes_nothing() {
        let (mut svc, mut t, a, b, room) = paired();
        let out = send(&mut svc, &mut t, &a, "x", "bogus");
        assert_matches!(out, Outcome::Rejected(MatchError::InvalidMode(_)));
        assert_eq!(
            t.take(&a),
            vec![ServerEvent::ErrorMessage("Invalid message mode.".into())]
        );
        assert!(t.take(&b).is_empty());
        assert_eq!(svc.room_of(&a), Some(&room));
        assert_eq!(svc.room_of(&b), Some(&room));
        assert_invariants(&svc, &t);
    }

    #[test]
    fn message_without_room_is_rejected() {
        let (mut svc, mut t, ids) = setup(&["a", "b"]);
        let _ = select(&mut svc, &mut t, &ids[1], "listener");
        for mode in ["normal", "solo", "listening", "bogus"] {
            let out = send(&mut svc, &mut t, &ids[0], "x", mode);
            assert_matches!(out, Outcome::Rejected(MatchError::NotInRoom));
            assert_eq!(
                t.take(&ids[0]),
                vec![ServerEvent::ErrorMessage("You are not in a chat room.".into())]
            );
        }
        assert!(t.take(&ids[1]).is_empty());
    }

    #[test]
    fn stats_track_queues_and_rooms() {
        let (mut svc, mut t, ids) = setup(&["c1", "c2", "l1"]);
        assert_eq!(svc.stats(), Stats { connections: 3, ..Stats::default() });
        let _ = select(&mut svc, &mut t, &ids[0], "confessor");
        let _ = select(&mut svc, &mut t, &ids[1], "confessor");
        let _ = select(&mut svc, &mut t, &ids[2], "listener");
        assert_eq!(
            svc.stats(),
            Stats {
                connections: 3,
                waiting_confessors: 1,
                waiting_listeners: 0,
                active_rooms: 1,
            }
        );
    }

    #[test]
    fn room_count_follows_burn_and_disconnect() {
        let (mut svc, mut t, ids) = setup(&["c1", "l1", "c2", "l2"]);
        for (id, role) in ids.iter().zip(["confessor", "listener", "confessor", "listener"]) {
            let _ = select(&mut svc, &mut t, id, role);
        }
        assert_eq!(svc.stats().active_rooms, 2);

        let _ = send(&mut svc, &mut t, &ids[0], "", "solo");
        assert_eq!(svc.stats().active_rooms, 1);

        let _ = svc.disconnect(&mut t, &ids[3]);
        assert_eq!(svc.stats().active_rooms, 0);
        assert_invariants(&svc, &t);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Step {
            Select(usize, bool),
            Send(usize, u8),
            Drop(usize),
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                3 => (0..12usize, any::<bool>()).prop_map(|(i, c)| Step::Select(i, c)),
                2 => (0..12usize, 0..4u8).prop_map(|(i, m)| Step::Send(i, m)),
                1 => (0..12usize).prop_map(Step::Drop),
            ]
        }

        proptest! {
            #[test]
            fn queues_drain_and_invariants_hold(steps in proptest::collection::vec(step(), 1..80)) {
                let names: Vec<String> = (0..12).map(|i| format!("p{i}")).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                let (mut svc, mut t, ids) = setup(&refs);

                for step in steps {
                    match step {
                        Step::Select(i, confessor) => {
                            let role = if confessor { "confessor" } else { "listener" };
                            let _ = select(&mut svc, &mut t, &ids[i], role);
                            prop_assert!(svc.queues().is_drained());
                        }
                        Step::Send(i, m) => {
                            let mode = ["normal", "listening", "solo", "bogus"][m as usize];
                            let _ = send(&mut svc, &mut t, &ids[i], "x", mode);
                        }
                        Step::Drop(i) => {
                            let _ = svc.disconnect(&mut t, &ids[i]);
                        }
                    }
                    assert_invariants(&svc, &t);
                }
            }
        }
    }
}
