use crate::error::GameError;
use log::{debug, info};
use shared::{
    Action, Bullet, BulletId, GameSnapshot, GameStatus, Player, PlayerId, BULLET_DAMAGE,
    PLAYER_STEP,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Hands out player ids. Ids start at 1, only grow, and are never recycled.
#[derive(Debug, Default)]
pub struct PlayerIdAllocator {
    last: AtomicU32,
}

impl PlayerIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> PlayerId {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Highest id handed out so far, 0 if none.
    pub fn last_issued(&self) -> PlayerId {
        self.last.load(Ordering::Relaxed)
    }
}

/// What applying an action did to the game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Moved,
    /// The move would have left the arena; the player stayed put.
    Blocked,
    Fired(BulletId),
}

/// Authoritative state of one arena.
///
/// Holds the player registry, the bullets in flight and the tick counter.
/// The server keeps exactly one behind a lock and only the tick loop ever
/// takes it for writing, so every mutation below happens between two ticks.
#[derive(Debug)]
pub struct GameState {
    version: u8,
    status: GameStatus,
    tick: u64,
    players: HashMap<PlayerId, Player>,
    bullets: Vec<Bullet>,
    ids: Arc<PlayerIdAllocator>,
    next_bullet_id: BulletId,
}

impl GameState {
    /// Creates an empty, `Idle` game state.
    ///
    /// The id allocator is passed in rather than owned so the server can read
    /// the last issued id without taking the state lock.
    pub fn new(version: u8, ids: Arc<PlayerIdAllocator>) -> Self {
        Self {
            version,
            status: GameStatus::Idle,
            tick: 0,
            players: HashMap::new(),
            bullets: Vec::new(),
            ids,
            next_bullet_id: 1,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn advance_tick(&mut self) {
        self.tick += 1;
    }

    /// Changes the status, logging the transition. Setting the current
    /// status again does nothing.
    pub fn set_status(&mut self, status: GameStatus) {
        if self.status != status {
            info!("Game state {:?} -> {:?}", self.status, status);
            self.status = status;
        }
    }

    /// Adds a new player and returns its id.
    ///
    /// The id comes from the shared allocator, so it is fresh and non-zero.
    /// Its parity picks the side: even ids spawn on the left edge, odd ids on
    /// the right. Every player starts at the top with full health.
    pub fn register_player(&mut self) -> PlayerId {
        let id = self.ids.next_id();
        let player = Player::new(id);

        info!(
            "Added player {} on the {:?} side at ({}, {})",
            id, player.side, player.position.x, player.position.y
        );
        self.players.insert(id, player);
        id
    }

    /// Drops a player from the registry, returning it if it was there.
    ///
    /// Bullets the player fired keep flying; they only reference the owner by id.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            info!("Removed player {}", id);
        }
        removed
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Registered player ids in ascending order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    /// Applies one action on behalf of a registered player.
    ///
    /// Moves shift the player by `PLAYER_STEP` vertically. A move that would
    /// leave the byte range is not an error: the player stays put and the
    /// outcome is [`ActionOutcome::Blocked`]. `Fire` spawns an active bullet at
    /// the player's position heading for the opposite side.
    ///
    /// Fails only when `id` is not in the registry.
    pub fn apply_action(&mut self, id: PlayerId, action: Action) -> Result<ActionOutcome, GameError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(GameError::UnknownPlayer(id))?;

        let y = i32::from(player.position.y);
        let moved = match action {
            Action::MoveDown => player.update_position(y + PLAYER_STEP),
            Action::MoveUp => player.update_position(y - PLAYER_STEP),
            Action::Fire => {
                let position = player.position;
                let direction = player.side.firing_direction();

                let bullet_id = self.next_bullet_id;
                self.next_bullet_id += 1;
                self.bullets
                    .push(Bullet::new(bullet_id, id, position, direction));
                debug!("Player {} fired bullet {} towards {:?}", id, bullet_id, direction);
                return Ok(ActionOutcome::Fired(bullet_id));
            }
        };

        Ok(if moved {
            ActionOutcome::Moved
        } else {
            ActionOutcome::Blocked
        })
    }

    /// Moves every active bullet one step, runs the collision hook against all
    /// players and drops bullets that are no longer active.
    pub fn advance_bullets(&mut self) {
        for bullet in &mut self.bullets {
            if !bullet.advance() {
                continue;
            }

            for player in self.players.values_mut() {
                if has_collided(bullet, player) {
                    bullet.deactivate();
                    let health = player.decrease_health(BULLET_DAMAGE);
                    debug!("Bullet {} hit player {} ({} hp left)", bullet.id, player.id, health);
                    break;
                }
            }
        }

        self.bullets.retain(Bullet::is_active);
    }

    /// Copies the current state for readers. Players are sorted by id and
    /// bullets keep their creation order.
    pub fn snapshot(&self) -> GameSnapshot {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_unstable_by_key(|p| p.id);

        GameSnapshot {
            version: self.version,
            status: self.status,
            tick: self.tick,
            players,
            bullets: self.bullets.clone(),
        }
    }
}

/// Collision hook between a bullet and a player. No hit model exists yet, so
/// nothing ever collides.
pub fn has_collided(_bullet: &Bullet, _player: &Player) -> bool {
    false
}
