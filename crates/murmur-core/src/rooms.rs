//! The symmetric pairing table.
//!
//! A room is an unordered pair of connections. The table stores both
//! directions of the mapping and tears them down together, so the peer of a
//! torn-down connection is handed out exactly once no matter how many times
//! or how concurrently teardown fires.

use crate::connection::ConnectionId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// Pairing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairingError {
    /// A connection cannot be paired with itself.
    #[error("Connection {0} cannot be paired with itself")]
    SelfPair(ConnectionId),

    /// One of the parties already has a room.
    #[error("Connection {0} is already paired")]
    AlreadyPaired(ConnectionId),
}

/// One direction of a room mapping.
#[derive(Debug, Clone)]
struct PeerLink {
    peer: ConnectionId,
    established_at: Instant,
}

/// Table of active rooms, keyed by member connection.
///
/// All operations take the table lock once and do their whole read-modify
/// cycle under it; nothing here blocks on I/O, so hold times stay short.
#[derive(Debug, Default)]
pub struct RoomTable {
    links: Mutex<HashMap<ConnectionId, PeerLink>>,
}

impl RoomTable {
    /// Create an empty room table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the symmetric mapping `{a, b}`.
    ///
    /// # Errors
    ///
    /// Fails if `a == b` or either party already has a room; the table is
    /// left untouched on failure.
    pub fn create(&self, a: &ConnectionId, b: &ConnectionId) -> Result<(), PairingError> {
        if a == b {
            return Err(PairingError::SelfPair(a.clone()));
        }

        let mut links = self.links.lock();
        if links.contains_key(a) {
            return Err(PairingError::AlreadyPaired(a.clone()));
        }
        if links.contains_key(b) {
            return Err(PairingError::AlreadyPaired(b.clone()));
        }

        let now = Instant::now();
        links.insert(
            a.clone(),
            PeerLink {
                peer: b.clone(),
                established_at: now,
            },
        );
        links.insert(
            b.clone(),
            PeerLink {
                peer: a.clone(),
                established_at: now,
            },
        );

        debug!(a = %a, b = %b, "Room created");
        Ok(())
    }

    /// Tear down `id`'s room, if any.
    ///
    /// Removes both mapping directions and returns the abandoned peer.
    /// Idempotent: the first call wins and every later (or concurrent) call
    /// for the same connection returns `None`, which is what bounds peer
    /// notifications to exactly one.
    pub fn teardown(&self, id: &ConnectionId) -> Option<ConnectionId> {
        let mut links = self.links.lock();
        let link = links.remove(id)?;
        links.remove(&link.peer);
        drop(links);

        debug!(connection = %id, peer = %link.peer, "Room torn down");
        Some(link.peer)
    }

    /// The current room partner of `id`, if paired.
    #[must_use]
    pub fn peer_of(&self, id: &ConnectionId) -> Option<ConnectionId> {
        self.links.lock().get(id).map(|link| link.peer.clone())
    }

    /// How long `id`'s room has existed.
    #[must_use]
    pub fn room_age(&self, id: &ConnectionId) -> Option<std::time::Duration> {
        self.links
            .lock()
            .get(id)
            .map(|link| link.established_at.elapsed())
    }

    /// Number of active rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.lock().len() / 2
    }

    /// Whether no rooms exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.lock().is_empty()
    }
}
