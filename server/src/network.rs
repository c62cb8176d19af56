//! Server supervisor: owns the listener, the shared state, the connection pool
//! and the tick loop, and runs the stop protocol.

use crate::config::{ServerConfig, ACCEPT_BACKOFF, WRITE_TIMEOUT};
use crate::connection::{Connection, ConnectionContext};
use crate::connection_pool::ConnectionPool;
use crate::error::ServerError;
use crate::game::{GameState, PlayerIdAllocator};
use crate::shutdown::{stop_requested, ShutdownHandle};
use crate::tick::TickLoop;
use log::{debug, error, info, warn};
use shared::{write_packet, GameStatus, Packet};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinSet;
use tokio::time::timeout;

/// Whether [`Server::run`] has completed. Only ever goes from `Running` to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Running,
    Stopped,
}

/// Cloneable view of a server that keeps working after [`Server::run`] has
/// taken ownership of it.
#[derive(Clone)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    game_state: Arc<RwLock<GameState>>,
    connections: Arc<RwLock<ConnectionPool>>,
    player_ids: Arc<PlayerIdAllocator>,
    shutdown: ShutdownHandle,
    stopped: Arc<AtomicBool>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn game_state(&self) -> Arc<RwLock<GameState>> {
        Arc::clone(&self.game_state)
    }

    pub fn connections(&self) -> Arc<RwLock<ConnectionPool>> {
        Arc::clone(&self.connections)
    }

    pub fn player_ids(&self) -> Arc<PlayerIdAllocator> {
        Arc::clone(&self.player_ids)
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn status(&self) -> ServerStatus {
        if self.stopped.load(Ordering::Acquire) {
            ServerStatus::Stopped
        } else {
            ServerStatus::Running
        }
    }
}

/// A bound, not yet running, arena server.
///
/// Binding and running are separate steps so callers can learn the local
/// address and grab a [`ServerHandle`] before [`Server::run`] takes ownership.
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    handle: ServerHandle,
}

impl Server {
    /// Binds the listener and creates the shared state.
    ///
    /// Nothing is accepted until [`Server::run`] is called. Fails with
    /// [`ServerError::Bind`] when the address is taken or not permitted.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
        info!("Server listening on {}", local_addr);

        let player_ids = Arc::new(PlayerIdAllocator::new());
        let game_state = GameState::new(config.version, Arc::clone(&player_ids));

        let handle = ServerHandle {
            local_addr,
            game_state: Arc::new(RwLock::new(game_state)),
            connections: Arc::new(RwLock::new(ConnectionPool::new(config.max_connections))),
            player_ids,
            shutdown: ShutdownHandle::new(),
            stopped: Arc::new(AtomicBool::new(false)),
        };

        Ok(Server {
            config,
            listener,
            handle,
        })
    }

    /// Cloneable view that stays valid after `run` consumed the server.
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.handle.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.handle.shutdown_handle()
    }

    pub fn game_state(&self) -> Arc<RwLock<GameState>> {
        self.handle.game_state()
    }

    pub fn connections(&self) -> Arc<RwLock<ConnectionPool>> {
        self.handle.connections()
    }

    pub fn status(&self) -> ServerStatus {
        self.handle.status()
    }

    /// Runs until the shutdown handle fires or accepting fails for good.
    ///
    /// On the way out, in order: stop accepting, close every connection and
    /// wait for the handlers, stop the tick loop and wait for it, close the
    /// listener. Returns only once all of that is done.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            config,
            listener,
            handle,
        } = self;

        let (command_tx, command_rx) = mpsc::channel(config.action_queue_capacity);
        let (tick_stop_tx, tick_stop_rx) = watch::channel(false);

        let running_status = if config.testing {
            GameStatus::Testing
        } else {
            GameStatus::Started
        };
        let tick_loop = TickLoop::new(
            handle.game_state(),
            command_rx,
            config.tick_interval,
            config.action_queue_capacity,
        )
        .with_running_status(running_status);
        let tick_task = tokio::spawn(tick_loop.run(tick_stop_rx));

        let ctx = ConnectionContext {
            pool: handle.connections(),
            game_state: handle.game_state(),
            commands: command_tx,
            stop: handle.shutdown.subscribe(),
        };

        info!("Ready to accept connections");
        let mut handlers = JoinSet::new();
        let result = accept_loop(&listener, &mut handlers, &ctx).await;

        // Accept failures take the same orderly path as a requested stop
        handle.shutdown.shutdown();

        info!("Closing {} connections", handlers.len());
        drain_handlers(&mut handlers, &handle, &config).await;

        if tick_stop_tx.send(true).is_err() {
            debug!("Tick loop already gone");
        }
        match tick_task.await {
            Ok(stats) => debug!("Tick loop finished: {:?}", stats),
            Err(e) => error!("Tick loop task failed: {}", e),
        }
        // the queue stays open until the tick loop is done with it
        drop(ctx);

        info!("Tearing down listener on {}", handle.local_addr);
        drop(listener);

        handle.stopped.store(true, Ordering::Release);
        info!("Server stopped");
        result
    }
}

async fn accept_loop(
    listener: &TcpListener,
    handlers: &mut JoinSet<()>,
    ctx: &ConnectionContext,
) -> Result<(), ServerError> {
    let mut stop = ctx.stop.clone();

    loop {
        tokio::select! {
            biased;
            _ = stop_requested(&mut stop) => {
                info!("No longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => admit(stream, peer, handlers, ctx).await,
                Err(e) if is_transient(&e) => warn!("Failed to accept incoming connection: {}", e),
                Err(e) if is_resource_exhausted(&e) => {
                    // pending clients wait in the backlog until descriptors free up
                    warn!("Out of file descriptors, pausing accept for {:?}: {}", ACCEPT_BACKOFF, e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
                Err(e) => {
                    error!("Listener failed: {}", e);
                    return Err(ServerError::Accept(e));
                }
            },
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = joined {
                    error!("Connection task failed: {}", e);
                }
            }
        }
    }
}

async fn admit(
    stream: TcpStream,
    peer: SocketAddr,
    handlers: &mut JoinSet<()>,
    ctx: &ConnectionContext,
) {
    let admitted = ctx.pool.write().await.admit(peer);

    match admitted {
        Ok(id) => {
            if let Err(e) = stream.set_nodelay(true) {
                debug!("{} could not set TCP_NODELAY: {}", id, e);
            }
            let (reader, writer) = stream.into_split();
            let connection = Connection::new(id, peer, reader, writer, ctx.clone());
            handlers.spawn(connection.run());
        }
        Err(e) => {
            warn!("Rejecting connection from {}: {}", peer, e);
            handlers.spawn(reject(stream, e.to_string()));
        }
    }
}

/// Tells a client it was not admitted, then drops the socket.
async fn reject(mut stream: TcpStream, reason: String) {
    let notice = Packet::Disconnected { reason };
    if let Ok(Err(e)) = timeout(WRITE_TIMEOUT, write_packet(&mut stream, &notice)).await {
        debug!("Could not notify rejected client: {}", e);
    }
}

/// Waits for every handler to close, aborting whatever is left after the grace period.
async fn drain_handlers(handlers: &mut JoinSet<()>, handle: &ServerHandle, config: &ServerConfig) {
    let drained = timeout(config.shutdown_grace, async {
        while let Some(joined) = handlers.join_next().await {
            if let Err(e) = joined {
                error!("Connection task failed: {}", e);
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            "{} connections still open after {:?}, aborting them",
            handlers.len(),
            config.shutdown_grace
        );
        handlers.shutdown().await;
        let dropped = handle.connections.write().await.clear();
        debug!("Dropped {} pool entries of aborted connections", dropped);
    }
}

/// Errors that only concern the connection being accepted, not the listener.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Per-process or system-wide descriptor limits (EMFILE, ENFILE). They clear
/// as soon as connections close, so they pause accepting instead of stopping it.
fn is_resource_exhausted(e: &io::Error) -> bool {
    const ENFILE: i32 = 23;
    const EMFILE: i32 = 24;

    cfg!(unix) && matches!(e.raw_os_error(), Some(ENFILE) | Some(EMFILE))
}
