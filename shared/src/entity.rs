//! Plain data records for the arena: positions, players and bullets.
//!
//! Coordinates live in the one-byte domain `[0, 255]`. Every setter takes a
//! wider integer so callers can compute `y + step` without wrapping, and
//! rejects anything outside the domain instead of clamping it.

use crate::{
    BulletId, PlayerId, ARENA_WIDTH, BULLET_STEP, PLAYER_DIMENSION, PLAYER_START_HEALTH, POSITION_MAX,
    POSITION_MIN,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: u8,
    pub y: u8,
}

impl Position {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Sets `x` if `value` is inside the byte domain. Returns whether it was applied.
    pub fn update_x(&mut self, value: i32) -> bool {
        match in_domain(value) {
            Some(v) => {
                self.x = v;
                true
            }
            None => false,
        }
    }

    /// Sets `y` if `value` is inside the byte domain. Returns whether it was applied.
    pub fn update_y(&mut self, value: i32) -> bool {
        match in_domain(value) {
            Some(v) => {
                self.y = v;
                true
            }
            None => false,
        }
    }
}

fn in_domain(value: i32) -> Option<u8> {
    if (POSITION_MIN..=POSITION_MAX).contains(&value) {
        u8::try_from(value).ok()
    } else {
        None
    }
}

/// Which edge of the arena a player spawns on.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn for_player(id: PlayerId) -> Self {
        if id % 2 == 0 {
            Side::Left
        } else {
            Side::Right
        }
    }

    pub fn spawn_x(self) -> u8 {
        match self {
            Side::Left => 0,
            Side::Right => ARENA_WIDTH - PLAYER_DIMENSION,
        }
    }

    /// Bullets fired from this side travel towards the opposite edge.
    pub fn firing_direction(self) -> BulletDirection {
        match self {
            Side::Left => BulletDirection::Right,
            Side::Right => BulletDirection::Left,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub position: Position,
    pub health: i32,
    pub side: Side,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        let side = Side::for_player(id);
        Self {
            id,
            position: Position::new(side.spawn_x(), 0),
            health: PLAYER_START_HEALTH,
            side,
        }
    }

    /// Moves the player vertically. Out-of-range values leave the player in place.
    pub fn update_position(&mut self, value: i32) -> bool {
        self.position.update_y(value)
    }

    pub fn decrease_health(&mut self, interval: i32) -> i32 {
        self.health -= interval;
        self.health
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum BulletDirection {
    Left,
    Right,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum BulletStatus {
    Inactive,
    Active,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Bullet {
    pub id: BulletId,
    pub position: Position,
    pub direction: BulletDirection,
    pub status: BulletStatus,
    /// Player that fired this bullet. Only the id is kept.
    pub owner: PlayerId,
}

impl Bullet {
    pub fn new(id: BulletId, owner: PlayerId, position: Position, direction: BulletDirection) -> Self {
        Self {
            id,
            position,
            direction,
            status: BulletStatus::Active,
            owner,
        }
    }

    /// Moves the bullet horizontally. Out-of-range values leave it in place.
    pub fn update_position(&mut self, value: i32) -> bool {
        self.position.update_x(value)
    }

    pub fn is_active(&self) -> bool {
        self.status == BulletStatus::Active
    }

    pub fn deactivate(&mut self) {
        self.status = BulletStatus::Inactive;
    }

    /// Moves one step along the bullet's direction, deactivating it when the
    /// step would leave the arena. Returns whether the bullet is still active.
    pub fn advance(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }

        let x = i32::from(self.position.x);
        let next = match self.direction {
            BulletDirection::Left => x - BULLET_STEP,
            BulletDirection::Right => x + BULLET_STEP,
        };

        if !self.update_position(next) {
            self.deactivate();
        }
        self.is_active()
    }
}
