//! Per-connection task.
//!
//! A handler decodes packets from its socket one at a time and turns valid
//! actions into [`Command`]s for the tick loop. It never mutates gameplay state
//! itself. The first valid action registers a player through the tick loop;
//! every later one is queued against that player.

use crate::config::{MAX_CONSECUTIVE_ERRORS, WRITE_TIMEOUT};
use crate::connection_pool::{ConnectionId, ConnectionPool};
use crate::game::GameState;
use crate::shutdown::stop_requested;
use crate::tick::Command;
use log::{debug, info, warn};
use shared::{read_packet, write_packet, Action, FrameError, Packet, PlayerId};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Admitted and reading, no player yet
    Connecting,
    /// Player assigned by the tick loop
    Registered,
    /// Forwarding actions for the registered player
    Streaming,
    Closing,
    Closed,
}

/// Why a connection is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    Shutdown,
    TooManyErrors,
    Failed,
}

/// Shared handles every connection needs.
#[derive(Clone)]
pub struct ConnectionContext {
    pub pool: Arc<RwLock<ConnectionPool>>,
    pub game_state: Arc<RwLock<GameState>>,
    pub commands: mpsc::Sender<Command>,
    pub stop: watch::Receiver<bool>,
}

pub struct Connection<R, W> {
    id: ConnectionId,
    peer: SocketAddr,
    reader: R,
    writer: Option<W>,
    player: Option<PlayerId>,
    phase: ConnectionPhase,
    consecutive_errors: u32,
    ctx: ConnectionContext,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(id: ConnectionId, peer: SocketAddr, reader: R, writer: W, ctx: ConnectionContext) -> Self {
        Self {
            id,
            peer,
            reader,
            writer: Some(writer),
            player: None,
            phase: ConnectionPhase::Connecting,
            consecutive_errors: 0,
            ctx,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    /// Serves the connection until the peer leaves, the stream breaks or the
    /// server stops, then releases everything it holds.
    pub async fn run(mut self) {
        debug!("{} streaming from {}", self.id, self.peer);
        let reason = self.stream().await;
        self.close(reason).await;
    }

    async fn stream(&mut self) -> CloseReason {
        loop {
            let result = tokio::select! {
                biased;
                _ = stop_requested(&mut self.ctx.stop) => return CloseReason::Shutdown,
                result = read_packet(&mut self.reader) => result,
            };

            let outcome = match result {
                Ok(packet) => self.handle_packet(packet).await,
                Err(FrameError::EndOfStream) => Err(CloseReason::PeerClosed),
                Err(e) if e.is_recoverable() => self.record_error(&e),
                Err(e) => {
                    warn!("{} read failed: {}", self.id, e);
                    Err(CloseReason::Failed)
                }
            };

            if let Err(reason) = outcome {
                return reason;
            }
        }
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<(), CloseReason> {
        match packet {
            Packet::Action { code } => match Action::try_from(code) {
                Ok(action) => {
                    self.consecutive_errors = 0;
                    self.forward(action).await
                }
                Err(e) => self.record_error(&e),
            },
            Packet::Echo { .. } => {
                self.consecutive_errors = 0;
                debug!("{} echo {:?}", self.id, packet);
                self.send(&packet).await
            }
            Packet::SnapshotRequest => {
                self.consecutive_errors = 0;
                let snapshot = self.ctx.game_state.read().await.snapshot();
                self.send(&Packet::Snapshot(snapshot)).await
            }
            other => {
                debug_assert!(other.is_server_only());
                self.record_error(&format!("unexpected client packet {:?}", other))
            }
        }
    }

    /// Logs a bad packet. Closes the connection once too many arrive in a row.
    fn record_error(&mut self, error: &dyn std::fmt::Display) -> Result<(), CloseReason> {
        self.consecutive_errors += 1;
        warn!(
            "{} rejected packet ({}/{}): {}",
            self.id, self.consecutive_errors, MAX_CONSECUTIVE_ERRORS, error
        );

        if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            Err(CloseReason::TooManyErrors)
        } else {
            Ok(())
        }
    }

    async fn forward(&mut self, action: Action) -> Result<(), CloseReason> {
        let player = match self.player {
            Some(player) => player,
            None => self.register().await?,
        };

        self.push(Command::Apply { player, action }).await
    }

    async fn register(&mut self) -> Result<PlayerId, CloseReason> {
        let (reply, mut rx) = oneshot::channel();
        self.push(Command::Join {
            connection: self.id,
            reply,
        })
        .await?;

        let player = tokio::select! {
            biased;
            _ = stop_requested(&mut self.ctx.stop) => {
                // a reply that already landed still owes the registry a Leave
                if let Ok(player) = rx.try_recv() {
                    self.player = Some(player);
                }
                return Err(CloseReason::Shutdown);
            }
            player = &mut rx => player.map_err(|_| CloseReason::Shutdown)?,
        };

        self.player = Some(player);
        self.transition(ConnectionPhase::Registered);
        self.ctx.pool.write().await.bind_player(self.id, player);

        self.send(&Packet::Welcome { player_id: player }).await?;
        self.transition(ConnectionPhase::Streaming);
        Ok(player)
    }

    /// Queues a command, waiting while the queue is full.
    async fn push(&mut self, command: Command) -> Result<(), CloseReason> {
        tokio::select! {
            biased;
            _ = stop_requested(&mut self.ctx.stop) => Err(CloseReason::Shutdown),
            sent = self.ctx.commands.send(command) => sent.map_err(|_| CloseReason::Shutdown),
        }
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), CloseReason> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(CloseReason::Failed);
        };

        match timeout(WRITE_TIMEOUT, write_packet(writer, packet)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("{} write failed: {}", self.id, e);
                Err(CloseReason::Failed)
            }
            Err(_) => {
                warn!("{} write timed out after {:?}", self.id, WRITE_TIMEOUT);
                Err(CloseReason::Failed)
            }
        }
    }

    fn transition(&mut self, next: ConnectionPhase) {
        debug!("{} {:?} -> {:?}", self.id, self.phase, next);
        self.phase = next;
    }

    /// Closes the socket, leaves the pool and hands the player back to the
    /// tick loop. Calling it again after the first time does nothing.
    pub async fn close(&mut self, reason: CloseReason) {
        if matches!(self.phase, ConnectionPhase::Closing | ConnectionPhase::Closed) {
            return;
        }
        self.transition(ConnectionPhase::Closing);

        if reason == CloseReason::Shutdown {
            let notice = Packet::Disconnected {
                reason: "server shutting down".to_string(),
            };
            let _ = self.send(&notice).await;
        }

        if let Some(mut writer) = self.writer.take() {
            match timeout(WRITE_TIMEOUT, writer.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("{} socket shutdown failed: {}", self.id, e),
                Err(_) => warn!("{} socket shutdown timed out", self.id),
            }
        }

        self.ctx.pool.write().await.remove(self.id);

        if let Some(player) = self.player.take() {
            if self.ctx.commands.send(Command::Leave { player }).await.is_err() {
                debug!("{} could not release player {}: action queue closed", self.id, player);
            }
        }

        info!("{} from {} closed ({:?})", self.id, self.peer, reason);
        self.transition(ConnectionPhase::Closed);
    }
}
