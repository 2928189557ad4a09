//! Per-region FIFO queues of waiting connections.
//!
//! Each region owns one queue, created lazily on first use and dropped when
//! it drains. The map is sharded by region so the pop-or-push step is
//! serialized per region without a global lock.

use crate::connection::ConnectionId;
use dashmap::DashMap;
use murmur_protocol::Region;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::debug;

/// One waiting connection.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// The waiting connection.
    pub id: ConnectionId,
    /// When the connection entered the queue.
    pub enqueued_at: Instant,
}

impl QueueEntry {
    fn new(id: ConnectionId) -> Self {
        Self {
            id,
            enqueued_at: Instant::now(),
        }
    }
}

/// The queue store: one FIFO queue per region.
#[derive(Debug, Default)]
pub struct RegionQueues {
    queues: DashMap<Region, VecDeque<QueueEntry>>,
}

impl RegionQueues {
    /// Create an empty queue store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically pop the longest-waiting entry of `region`'s queue, or push
    /// `id` to the back if the queue is empty.
    ///
    /// Returns the popped connection if one was waiting. The whole step runs
    /// under the entry guard for `region`, so two concurrent calls can
    /// neither both observe an empty queue nor both pop the sole entry.
    ///
    /// Caller contract: `id` must not currently be queued anywhere
    /// (run [`RegionQueues::remove`] first).
    pub fn pop_or_push(&self, region: &Region, id: &ConnectionId) -> Option<ConnectionId> {
        let popped = {
            let mut queue = self.queues.entry(region.clone()).or_default();
            match queue.pop_front() {
                Some(entry) => Some(entry.id),
                None => {
                    queue.push_back(QueueEntry::new(id.clone()));
                    debug!(connection = %id, region = %region, "Enqueued, no match yet");
                    None
                }
            }
        };

        if popped.is_some() {
            // Entry guard released above; only removes if still drained.
            self.queues.remove_if(region, |_, q| q.is_empty());
        }

        popped
    }

    /// Remove `id` from whatever queue currently holds it.
    ///
    /// Returns `true` if an entry was removed. Absence is not an error; this
    /// is safe to call defensively before every join attempt.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        let mut removed = false;
        for mut queue in self.queues.iter_mut() {
            let before = queue.len();
            queue.retain(|entry| &entry.id != id);
            if queue.len() != before {
                removed = true;
                debug!(connection = %id, region = %queue.key(), "Left queue");
            }
        }
        self.queues.retain(|_, q| !q.is_empty());
        removed
    }

    /// Number of connections waiting in `region`.
    #[must_use]
    pub fn depth(&self, region: &Region) -> usize {
        self.queues.get(region).map(|q| q.len()).unwrap_or(0)
    }

    /// Total number of waiting connections across all regions.
    #[must_use]
    pub fn total_waiting(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Whether `id` is waiting in any queue.
    #[must_use]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.queues
            .iter()
            .any(|q| q.iter().any(|entry| &entry.id == id))
    }
}
