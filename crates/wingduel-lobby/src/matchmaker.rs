//! FIFO matchmaking queue.

use std::collections::VecDeque;

use wingduel_transport::ConnectionId;

/// Connections waiting for an opponent, oldest first.
///
/// A connection appears at most once. Pairing always takes the two
/// longest-waiting entries; there is no rating, region or priority.
#[derive(Debug, Default)]
pub struct Matchmaker {
    queue: VecDeque<ConnectionId>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `connection` to the back of the queue.
    ///
    /// Returns `false` (and leaves the queue alone) if it is already
    /// waiting.
    pub fn enqueue(&mut self, connection: ConnectionId) -> bool {
        if self.queue.contains(&connection) {
            return false;
        }
        self.queue.push_back(connection);
        tracing::debug!(%connection, waiting = self.queue.len(), "enqueued");
        true
    }

    /// Removes `connection` wherever it sits. Other entries keep their
    /// relative order. Returns `true` if it was queued.
    pub fn remove(&mut self, connection: ConnectionId) -> bool {
        match self.queue.iter().position(|c| *c == connection) {
            Some(pos) => {
                self.queue.remove(pos);
                tracing::debug!(%connection, waiting = self.queue.len(), "dequeued");
                true
            }
            None => false,
        }
    }

    /// Pops the two longest-waiting connections, or `None` if fewer than
    /// two are queued. The first element of the pair waited longest.
    pub fn pop_pair(&mut self) -> Option<(ConnectionId, ConnectionId)> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some((first, second))
    }

    /// Drains every complete pair, in arrival order.
    pub fn drain_pairs(&mut self) -> Vec<(ConnectionId, ConnectionId)> {
        std::iter::from_fn(|| self.pop_pair()).collect()
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.queue.contains(&connection)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The waiting connections, oldest first.
    pub fn waiting(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.queue.iter().copied()
    }
}
