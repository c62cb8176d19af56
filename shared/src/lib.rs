//! Types shared by the arena server and its clients: the entity model, the
//! closed action set, the wire envelope and the framing used on the stream.

pub mod action;
pub mod entity;
pub mod error;
pub mod framing;
pub mod packet;

pub use action::Action;
pub use entity::{Bullet, BulletDirection, BulletStatus, Player, Position, Side};
pub use error::{FrameError, ProtocolError};
pub use framing::{read_packet, write_packet};
pub use packet::{GameSnapshot, GameStatus, Packet};

pub type PlayerId = u32;
pub type BulletId = u32;

/// Bumped whenever the layout of [`Packet`] changes.
pub const PROTOCOL_VERSION: u8 = 1;

pub const POSITION_MIN: i32 = 0;
pub const POSITION_MAX: i32 = 255;

/// Width of the playing field. Right-side players spawn flush with this edge;
/// positions themselves may still range over the whole byte domain.
pub const ARENA_WIDTH: u8 = 100;

pub const PLAYER_STEP: i32 = 10;
pub const PLAYER_DIMENSION: u8 = 10;
pub const PLAYER_START_HEALTH: i32 = 100;

pub const BULLET_STEP: i32 = 1;
pub const BULLET_DAMAGE: i32 = 10;

/// Largest frame payload accepted from the stream, version byte included.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;
