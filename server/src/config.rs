use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// ~60 Hz.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Hard cap on concurrently admitted connections.
pub const MAX_CONNECTIONS: usize = 10_000;

/// Enough to absorb a tick's worth of traffic from a full server.
pub const ACTION_QUEUE_CAPACITY: usize = 1024;

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Upper bound for any single write to a client socket.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause before accepting again after the process ran out of descriptors.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Consecutive undecodable packets tolerated before a connection is dropped.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// Tunables for a [`crate::network::Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub tick_interval: Duration,
    pub max_connections: usize,
    pub action_queue_capacity: usize,
    /// Game state version tag reported in snapshots.
    pub version: u8,
    /// Run the game state in `Testing` rather than `Started` status.
    pub testing: bool,
    /// How long handlers get to close before they are aborted on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_connections: MAX_CONNECTIONS,
            action_queue_capacity: ACTION_QUEUE_CAPACITY,
            version: 1,
            testing: false,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl ServerConfig {
    /// Defaults bound to an ephemeral port on loopback.
    pub fn ephemeral() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Self::default()
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }
}
