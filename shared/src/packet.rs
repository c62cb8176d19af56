use crate::{Bullet, Player, PlayerId};
use serde::{Deserialize, Serialize};

/// Lifecycle of the shared game state.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Idle,
    Started,
    Testing,
    Error,
}

/// Read-only copy of the game state at the end of a tick.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub version: u8,
    pub status: GameStatus,
    pub tick: u64,
    pub players: Vec<Player>,
    pub bullets: Vec<Bullet>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    // client -> server
    Action {
        code: u8,
    },
    /// Connectivity check. The server writes the same packet back.
    Echo {
        flag: bool,
        magic: u16,
        player_id: PlayerId,
    },
    SnapshotRequest,

    // server -> client
    Welcome {
        player_id: PlayerId,
    },
    Snapshot(GameSnapshot),
    Disconnected {
        reason: String,
    },
}

impl Packet {
    pub fn action(action: crate::Action) -> Self {
        Packet::Action {
            code: action.code(),
        }
    }

    /// Packets only the server is supposed to send.
    pub fn is_server_only(&self) -> bool {
        matches!(
            self,
            Packet::Welcome { .. } | Packet::Snapshot(_) | Packet::Disconnected { .. }
        )
    }
}
