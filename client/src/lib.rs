//! # Arena Client Library
//!
//! Headless client for the arena server. It speaks the same length-prefixed
//! protocol as the server and is used by the load bot and by the end-to-end
//! tests.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! [`GameClient`] wraps one TCP connection:
//! - Framed send/receive of [`shared::Packet`]s
//! - Joining the game and picking up the assigned player id
//! - Echo round trips and snapshot requests
//!
//! ### Bot Module (`bot`)
//! Scripted players that send random actions at a fixed rate.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::GameClient;
//! use shared::Action;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = GameClient::connect("127.0.0.1:8080".parse()?).await?;
//!     let player_id = client.join(Action::MoveDown).await?;
//!     let snapshot = client.snapshot().await?;
//!     println!("player {} at tick {}", player_id, snapshot.tick);
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod error;
pub mod network;

pub use error::ClientError;
pub use network::GameClient;
