//! The lobby: matchmaking and relay orchestration.
//!
//! The lobby owns the queue store, the room table, and the registry of
//! connected clients' outbound channels. Matchmaker and room-manager
//! operations all go through it, which keeps the invariant that a connection
//! sits in at most one queue or at most one room, never both.
//!
//! Delivery is fire-and-forget: a frame addressed to a connection that is no
//! longer registered is dropped silently, and the sender learns nothing.
//! Per-sender ordering falls out of the per-connection mpsc channel.

use crate::connection::ConnectionId;
use crate::queue::RegionQueues;
use crate::rooms::RoomTable;
use dashmap::DashMap;
use murmur_protocol::{Frame, Region, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Result of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Paired immediately with a waiting connection; the joiner initiates.
    Matched {
        /// The previously-waiting peer.
        peer: ConnectionId,
    },
    /// No one was waiting; the joiner is now queued.
    Enqueued,
}

/// Lobby statistics.
#[derive(Debug, Clone)]
pub struct LobbyStats {
    /// Number of registered connections.
    pub connections: usize,
    /// Number of connections waiting in region queues.
    pub waiting: usize,
    /// Number of active rooms.
    pub rooms: usize,
}

/// The central matchmaking and relay component.
pub struct Lobby {
    queues: RegionQueues,
    rooms: RoomTable,
    /// Outbound frame channel per registered connection.
    senders: DashMap<ConnectionId, mpsc::UnboundedSender<Frame>>,
}

impl Lobby {
    /// Create an empty lobby.
    #[must_use]
    pub fn new() -> Self {
        info!("Creating lobby");
        Self {
            queues: RegionQueues::new(),
            rooms: RoomTable::new(),
            senders: DashMap::new(),
        }
    }

    /// Register a connection and return its outbound frame receiver.
    ///
    /// The caller drains the receiver and writes each frame to the client's
    /// socket. Registering an already-registered ID replaces its channel.
    pub fn register(&self, id: &ConnectionId) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(id.clone(), tx);
        debug!(connection = %id, "Connection registered");
        rx
    }

    /// Remove a connection entirely: queue, room (with peer notification),
    /// and outbound channel.
    ///
    /// Call on every disconnect path. Idempotent.
    pub fn disconnect(&self, id: &ConnectionId) {
        self.leave(id);
        if self.senders.remove(id).is_some() {
            debug!(connection = %id, "Connection unregistered");
        }
    }

    /// Handle a join request: run the composite cleanup, then pop-or-push.
    ///
    /// On a pairing the joiner becomes the initiator and the popped waiter
    /// the responder; both sides are notified through their channels.
    pub fn join_queue(&self, id: &ConnectionId, region: &Region) -> JoinOutcome {
        // A client may re-join while still queued or paired ("next", retry
        // after a dropped socket). Clear any previous state first so the
        // queue/room exclusivity invariant holds before matching proceeds.
        self.leave(id);

        loop {
            let Some(waiter) = self.queues.pop_or_push(region, id) else {
                return JoinOutcome::Enqueued;
            };

            match self.rooms.create(id, &waiter) {
                Ok(()) => {
                    // The waiter may have disconnected between the pop and
                    // the room install; its cleanup found neither queue
                    // entry nor room, so nobody else will undo this pairing.
                    if !self.senders.contains_key(&waiter) {
                        warn!(waiter = %waiter, "Popped waiter vanished, retrying");
                        self.rooms.teardown(id);
                        continue;
                    }
                    info!(initiator = %id, responder = %waiter, region = %region, "Matched");
                    self.send(id, Frame::matched(waiter.as_str(), true));
                    self.send(&waiter, Frame::matched(id.as_str(), false));
                    return JoinOutcome::Matched { peer: waiter };
                }
                Err(e) => {
                    // A queue entry for an already-paired connection means
                    // its cleanup never ran; discard it and try the next.
                    warn!(waiter = %waiter, error = %e, "Discarding unpairable queue entry");
                }
            }
        }
    }

    /// Composite cleanup: leave the queue and tear down the room.
    ///
    /// Tearing down a room notifies the abandoned peer exactly once; the
    /// room table's idempotent teardown makes a duplicate or concurrent
    /// leave a no-op.
    pub fn leave(&self, id: &ConnectionId) {
        self.queues.remove(id);
        if let Some(peer) = self.rooms.teardown(id) {
            debug!(connection = %id, peer = %peer, "Notifying abandoned peer");
            self.send(&peer, Frame::PeerDisconnected);
        }
    }

    /// Forward an opaque negotiation envelope from `from` to `to`.
    ///
    /// Only the recipient's current room partner may signal it; envelopes
    /// from anyone else are dropped, which keeps a stale or hostile
    /// connection from injecting negotiation into an unrelated session.
    /// Returns `true` if the envelope was handed to the recipient's channel.
    pub fn relay(
        &self,
        from: &ConnectionId,
        to: &ConnectionId,
        kind: SignalKind,
        payload: Vec<u8>,
    ) -> bool {
        if self.rooms.peer_of(to).as_ref() != Some(from) {
            warn!(from = %from, to = %to, kind = ?kind, "Dropping envelope from non-partner");
            return false;
        }

        trace!(from = %from, to = %to, kind = ?kind, bytes = payload.len(), "Relaying envelope");
        self.send(to, Frame::signal_from(from.as_str(), kind, payload))
    }

    /// Current room partner of `id`, if any.
    #[must_use]
    pub fn peer_of(&self, id: &ConnectionId) -> Option<ConnectionId> {
        self.rooms.peer_of(id)
    }

    /// Whether `id` is waiting in a region queue.
    #[must_use]
    pub fn is_waiting(&self, id: &ConnectionId) -> bool {
        self.queues.contains(id)
    }

    /// Get lobby statistics.
    #[must_use]
    pub fn stats(&self) -> LobbyStats {
        LobbyStats {
            connections: self.senders.len(),
            waiting: self.queues.total_waiting(),
            rooms: self.rooms.len(),
        }
    }

    /// Push a frame to a connection's channel.
    ///
    /// Undeliverable frames are dropped without surfacing an error to the
    /// caller. Fire-and-forget by design; there is no retry.
    fn send(&self, to: &ConnectionId, frame: Frame) -> bool {
        match self.senders.get(to) {
            Some(tx) => tx.send(frame).is_ok(),
            None => {
                debug!(to = %to, "Recipient not connected, dropping frame");
                false
            }
        }
    }
}

impl Default for Lobby {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(s: &str) -> Region {
        s.parse().unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_fifo_pairing_creates_floor_n_half_rooms() {
        let lobby = Lobby::new();
        let ids: Vec<ConnectionId> = (1..=5).map(|i| format!("c{i}").into()).collect();
        let mut receivers: Vec<_> = ids.iter().map(|id| lobby.register(id)).collect();

        let outcomes: Vec<_> = ids
            .iter()
            .map(|id| lobby.join_queue(id, &Region::global()))
            .collect();

        // Strict FIFO: c2 pairs with c1, c4 with c3, c5 keeps waiting.
        assert_eq!(outcomes[0], JoinOutcome::Enqueued);
        assert_eq!(outcomes[1], JoinOutcome::Matched { peer: "c1".into() });
        assert_eq!(outcomes[2], JoinOutcome::Enqueued);
        assert_eq!(outcomes[3], JoinOutcome::Matched { peer: "c3".into() });
        assert_eq!(outcomes[4], JoinOutcome::Enqueued);

        assert_eq!(lobby.stats().rooms, 2);
        assert_eq!(lobby.stats().waiting, 1);

        // Joiner is initiator, waiter is responder.
        assert_eq!(
            drain(&mut receivers[1]),
            vec![Frame::matched("c1", true)]
        );
        assert_eq!(
            drain(&mut receivers[0]),
            vec![Frame::matched("c2", false)]
        );
    }

    #[test]
    fn test_no_dual_membership() {
        let lobby = Lobby::new();
        for i in 1..=5 {
            let id: ConnectionId = format!("c{i}").into();
            let _rx = lobby.register(&id);
            lobby.join_queue(&id, &Region::global());
        }

        for i in 1..=5 {
            let id: ConnectionId = format!("c{i}").into();
            let queued = lobby.is_waiting(&id);
            let paired = lobby.peer_of(&id).is_some();
            assert!(!(queued && paired), "{id} is in a queue and a room");
        }

        // Re-joining while paired first tears the old room down.
        let _rx = lobby.register(&"c1".into());
        lobby.join_queue(&"c1".into(), &region("DE"));
        assert!(lobby.is_waiting(&"c1".into()));
        assert_eq!(lobby.peer_of(&"c1".into()), None);
    }

    #[test]
    fn test_duplicate_leave_notifies_peer_once() {
        let lobby = Lobby::new();
        let _rx_a = lobby.register(&"a".into());
        let mut rx_b = lobby.register(&"b".into());

        lobby.join_queue(&"a".into(), &Region::global());
        lobby.join_queue(&"b".into(), &Region::global());
        drain(&mut rx_b);

        // Transport close racing an explicit leave-room command.
        lobby.leave(&"a".into());
        lobby.leave(&"a".into());

        assert_eq!(drain(&mut rx_b), vec![Frame::PeerDisconnected]);
    }

    #[test]
    fn test_cross_region_isolation() {
        let lobby = Lobby::new();
        for id in ["c1", "c2", "c3"] {
            let _rx = lobby.register(&id.into());
        }

        assert_eq!(
            lobby.join_queue(&"c1".into(), &region("DE")),
            JoinOutcome::Enqueued
        );
        assert_eq!(
            lobby.join_queue(&"c2".into(), &Region::global()),
            JoinOutcome::Enqueued
        );
        assert_eq!(
            lobby.join_queue(&"c3".into(), &region("DE")),
            JoinOutcome::Matched { peer: "c1".into() }
        );
        assert!(lobby.is_waiting(&"c2".into()));
    }

    #[test]
    fn test_relay_requires_room_partnership() {
        let lobby = Lobby::new();
        let _rx_a = lobby.register(&"a".into());
        let mut rx_b = lobby.register(&"b".into());
        let _rx_x = lobby.register(&"x".into());

        lobby.join_queue(&"a".into(), &Region::global());
        lobby.join_queue(&"b".into(), &Region::global());
        drain(&mut rx_b);

        assert!(lobby.relay(&"a".into(), &"b".into(), SignalKind::Offer, b"sdp".to_vec()));
        // An outsider cannot inject signaling into the a/b session.
        assert!(!lobby.relay(&"x".into(), &"b".into(), SignalKind::Offer, b"evil".to_vec()));

        let frames = drain(&mut rx_b);
        assert_eq!(
            frames,
            vec![Frame::signal_from("a", SignalKind::Offer, b"sdp".to_vec())]
        );
    }

    #[test]
    fn test_vanished_waiter_is_not_paired() {
        let lobby = Lobby::new();
        let _rx_a = lobby.register(&"a".into());
        lobby.join_queue(&"a".into(), &Region::global());

        // a's socket dies without its cleanup running, so the stale queue
        // entry survives until someone tries to pair with it.
        lobby.senders.remove(&ConnectionId::from("a"));

        let _rx_b = lobby.register(&"b".into());
        assert_eq!(
            lobby.join_queue(&"b".into(), &Region::global()),
            JoinOutcome::Enqueued
        );
        assert_eq!(lobby.stats().rooms, 0);
        assert!(lobby.is_waiting(&"b".into()));
        assert_eq!(lobby.peer_of(&"b".into()), None);
    }

    #[test]
    fn test_undeliverable_envelope_is_dropped_silently() {
        let lobby = Lobby::new();
        let _rx_a = lobby.register(&"a".into());
        let _rx_b = lobby.register(&"b".into());
        lobby.join_queue(&"a".into(), &Region::global());
        lobby.join_queue(&"b".into(), &Region::global());

        // b's socket goes away but its room lingers until cleanup runs.
        lobby.senders.remove(&ConnectionId::from("b"));
        assert!(!lobby.relay(&"a".into(), &"b".into(), SignalKind::Answer, b"sdp".to_vec()));
    }

    #[test]
    fn test_per_sender_ordering() {
        let lobby = Lobby::new();
        let _rx_a = lobby.register(&"a".into());
        let mut rx_b = lobby.register(&"b".into());
        lobby.join_queue(&"a".into(), &Region::global());
        lobby.join_queue(&"b".into(), &Region::global());
        drain(&mut rx_b);

        for i in 0u8..10 {
            lobby.relay(&"a".into(), &"b".into(), SignalKind::IceCandidate, vec![i]);
        }

        let payloads: Vec<u8> = drain(&mut rx_b)
            .into_iter()
            .map(|f| match f {
                Frame::Signal { payload, .. } => payload[0],
                other => panic!("unexpected frame {other:?}"),
            })
            .collect();
        assert_eq!(payloads, (0u8..10).collect::<Vec<_>>());
    }
}
