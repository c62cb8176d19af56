//! Admission control and bookkeeping for live connections.
//!
//! The pool tracks which connections are currently admitted and which player,
//! if any, each one has registered as. It is only used for capacity checks and
//! diagnostics; the game state remains the source of truth for players.
//!
//! Connections are keyed by an opaque [`ConnectionId`] assigned at accept time,
//! never by the socket address or handle.

use crate::error::AdmissionError;
use log::{debug, info};
use shared::PlayerId;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

/// Identifier assigned to a connection when it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// One admitted connection
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub id: ConnectionId,
    /// Remote address, kept for logging only
    pub peer: SocketAddr,
    /// Player this connection registered as, once it sent a valid action
    pub player: Option<PlayerId>,
    pub connected_at: Instant,
}

/// Tracks admitted connections up to a fixed capacity
///
/// Wrapped in its own lock by the server, separate from the game state lock,
/// so admission bookkeeping never waits on a tick.
pub struct ConnectionPool {
    entries: HashMap<ConnectionId, PoolEntry>,
    /// Next connection id to hand out
    next_connection_id: u64,
    /// Maximum number of concurrent connections allowed
    max_connections: usize,
}

impl ConnectionPool {
    pub fn new(max_connections: usize) -> Self {
        Self {
            entries: HashMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    /// Admits a freshly accepted connection if the pool has room.
    ///
    /// The capacity check and the insert happen under the same borrow, so the
    /// pool can never grow past `max_connections`.
    pub fn admit(&mut self, peer: SocketAddr) -> Result<ConnectionId, AdmissionError> {
        if self.entries.len() >= self.max_connections {
            return Err(AdmissionError::PoolFull {
                capacity: self.max_connections,
            });
        }

        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;

        info!("{} admitted from {} ({} live)", id, peer, self.entries.len() + 1);
        self.entries.insert(
            id,
            PoolEntry {
                id,
                peer,
                player: None,
                connected_at: Instant::now(),
            },
        );

        Ok(id)
    }

    /// Records the player a connection registered as. Returns false if the
    /// connection is no longer in the pool.
    pub fn bind_player(&mut self, id: ConnectionId, player: PlayerId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.player = Some(player);
                debug!("{} registered as player {}", id, player);
                true
            }
            None => false,
        }
    }

    /// Removes a connection. Removing an unknown or already removed id is a no-op.
    pub fn remove(&mut self, id: ConnectionId) -> Option<PoolEntry> {
        let entry = self.entries.remove(&id);
        if let Some(entry) = &entry {
            info!(
                "{} released after {:?} ({} live)",
                id,
                entry.connected_at.elapsed(),
                self.entries.len()
            );
        }
        entry
    }

    /// Forgets every entry. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn get(&self, id: ConnectionId) -> Option<&PoolEntry> {
        self.entries.get(&id)
    }

    pub fn player_of(&self, id: ConnectionId) -> Option<PlayerId> {
        self.entries.get(&id).and_then(|entry| entry.player)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn capacity(&self) -> usize {
        self.max_connections
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_connections
    }
}
