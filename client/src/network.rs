use crate::error::ClientError;
use log::{debug, info};
use shared::{read_packet, write_packet, Action, FrameError, GameSnapshot, Packet, PlayerId};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// How long request/reply helpers wait for the server before giving up
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// One TCP connection to the arena server.
pub struct GameClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    server_addr: SocketAddr,
    player_id: Option<PlayerId>,
}

impl GameClient {
    pub async fn connect(server_addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server_addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: server_addr,
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY: {}", e);
        }
        let (reader, writer) = stream.into_split();

        debug!("Connected to {}", server_addr);
        Ok(GameClient {
            reader,
            writer,
            server_addr,
            player_id: None,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Player id assigned by the server, known once a `Welcome` was received.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub async fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        write_packet(&mut self.writer, packet).await?;
        Ok(())
    }

    /// Sends raw bytes, bypassing framing. Used to check how the server copes
    /// with garbage.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(FrameError::from)?;
        self.writer.flush().await.map_err(FrameError::from)?;
        Ok(())
    }

    /// Reads the next packet. A clean end of stream is reported as
    /// [`ClientError::Closed`].
    pub async fn recv(&mut self) -> Result<Packet, ClientError> {
        match read_packet(&mut self.reader).await {
            Ok(packet) => {
                if let Packet::Welcome { player_id } = packet {
                    self.player_id = Some(player_id);
                }
                Ok(packet)
            }
            Err(FrameError::EndOfStream) => Err(ClientError::Closed),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn recv_timeout(&mut self, limit: Duration) -> Result<Packet, ClientError> {
        timeout(limit, self.recv())
            .await
            .map_err(|_| ClientError::Timeout(limit))?
    }

    pub async fn send_action(&mut self, action: Action) -> Result<(), ClientError> {
        self.send(&Packet::action(action)).await
    }

    /// Sends an action and, on the first one, waits for the server to assign
    /// a player id.
    pub async fn join(&mut self, action: Action) -> Result<PlayerId, ClientError> {
        self.send_action(action).await?;
        if let Some(id) = self.player_id {
            return Ok(id);
        }

        match self.recv_timeout(REPLY_TIMEOUT).await? {
            Packet::Welcome { player_id } => {
                info!("Joined {} as player {}", self.server_addr, player_id);
                Ok(player_id)
            }
            Packet::Disconnected { reason } => Err(ClientError::Disconnected(reason)),
            other => Err(ClientError::UnexpectedPacket(other)),
        }
    }

    /// Round-trips an echo packet and returns what came back.
    pub async fn echo(&mut self, magic: u16, player_id: PlayerId) -> Result<Packet, ClientError> {
        self.send(&Packet::Echo {
            flag: true,
            magic,
            player_id,
        })
        .await?;

        match self.recv_timeout(REPLY_TIMEOUT).await? {
            echo @ Packet::Echo { .. } => Ok(echo),
            Packet::Disconnected { reason } => Err(ClientError::Disconnected(reason)),
            other => Err(ClientError::UnexpectedPacket(other)),
        }
    }

    pub async fn snapshot(&mut self) -> Result<GameSnapshot, ClientError> {
        self.send(&Packet::SnapshotRequest).await?;

        loop {
            match self.recv_timeout(REPLY_TIMEOUT).await? {
                Packet::Snapshot(snapshot) => return Ok(snapshot),
                // a late Welcome can still be in flight
                Packet::Welcome { .. } => continue,
                Packet::Disconnected { reason } => return Err(ClientError::Disconnected(reason)),
                other => return Err(ClientError::UnexpectedPacket(other)),
            }
        }
    }

    /// Half-closes the connection so the server sees end of stream.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await.map_err(FrameError::from)?;
        Ok(())
    }
}
