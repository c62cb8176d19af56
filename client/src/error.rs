use shared::{FrameError, Packet};
use std::io;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("server closed the connection")]
    Closed,
    #[error("server disconnected us: {0}")]
    Disconnected(String),
    #[error("unexpected packet from server: {0:?}")]
    UnexpectedPacket(Packet),
    #[error("no reply from server within {0:?}")]
    Timeout(std::time::Duration),
}
