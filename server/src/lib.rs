//! # Arena Server Library
//!
//! Authoritative server for a two-sided arena shooter. Clients connect over
//! TCP, stream small intent packets (move up, move down, fire), and the server
//! owns the one true copy of the game state.
//!
//! ## Core Responsibilities
//!
//! ### Admission Control
//! Every accepted socket is checked against the connection pool before a
//! handler is spawned for it. Once the pool is at capacity further clients get
//! a short "server full" notice and are disconnected. The pool has its own
//! lock, separate from the game state, so admission never waits on a tick.
//!
//! ### Authoritative Simulation
//! A single tick loop is the only writer of the game state. Connection handlers
//! decode packets and push commands onto a bounded queue; the tick loop drains
//! that queue without blocking at a fixed cadence, applies the commands in
//! arrival order and advances bullets. A full queue blocks the handler that
//! tries to push, which is the only backpressure in the system.
//!
//! ### Orderly Shutdown
//! A stop request flows through the server in a fixed order: the accept loop
//! stops accepting, every connection is told to close and is waited for, the
//! tick loop is stopped and waited for, and finally the listener is closed.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Tunables and their defaults: bind address, tick interval, connection cap,
//! queue capacity.
//!
//! ### Game Module (`game`)
//! The game state: player registry, bullets, id allocation, action rules and
//! the collision hook.
//!
//! ### Connection Pool Module (`connection_pool`)
//! Admission bookkeeping keyed by opaque connection ids.
//!
//! ### Connection Module (`connection`)
//! The per-connection task and its lifecycle.
//!
//! ### Tick Module (`tick`)
//! The fixed-rate update loop and the commands it consumes.
//!
//! ### Network Module (`network`)
//! The supervisor that ties everything together and runs the stop protocol.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!
//!     // Trigger the stop protocol on ctrl-c
//!     let shutdown = server.shutdown_handle();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.shutdown();
//!     });
//!
//!     // Returns once every connection, the tick loop and the listener are closed
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod connection_pool;
pub mod error;
pub mod game;
pub mod network;
pub mod shutdown;
pub mod tick;
