use shared::PlayerId;
use std::io;

/// Rejections from the game state. Reported to the caller, never fatal to the tick loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("connection pool full ({capacity} connections)")]
    PoolFull { capacity: usize },
}

/// Failures that take the whole server down.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
    #[error("failed to read listener address: {0}")]
    LocalAddr(#[source] io::Error),
}
