//! The authoritative update loop.
//!
//! The tick loop is the only code that takes the game state's write lock.
//! Connection handlers never touch gameplay state directly: they push
//! [`Command`]s onto the bounded action queue and the loop applies them, in
//! arrival order, at the start of the next tick.

use crate::connection_pool::ConnectionId;
use crate::game::GameState;
use log::{debug, error, info, warn};
use shared::{Action, GameStatus, PlayerId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Work queued by connection handlers for the tick loop
#[derive(Debug)]
pub enum Command {
    /// Register a new player for a connection and send back its id
    Join {
        connection: ConnectionId,
        reply: oneshot::Sender<PlayerId>,
    },
    /// The connection owning this player closed
    Leave { player: PlayerId },
    Apply { player: PlayerId, action: Action },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub applied: u64,
    pub rejected: u64,
}

/// Fixed-rate driver of the game state.
///
/// Owns the receiving end of the action queue. Each tick it applies what
/// connection handlers queued since the previous one, then moves the world
/// forward. Nothing else writes to the game state while a loop is running.
pub struct TickLoop {
    state: Arc<RwLock<GameState>>,
    commands: mpsc::Receiver<Command>,
    interval: Duration,
    drain_limit: usize,
    running_status: GameStatus,
    queue_closed: bool,
    stats: TickStats,
}

impl TickLoop {
    /// Creates a loop over `state` fed by `commands`.
    ///
    /// `drain_limit` caps how many commands a single tick applies, so a burst
    /// spreads over several ticks instead of stretching one. It is usually the
    /// queue capacity and is never less than one.
    pub fn new(
        state: Arc<RwLock<GameState>>,
        commands: mpsc::Receiver<Command>,
        interval: Duration,
        drain_limit: usize,
    ) -> Self {
        Self {
            state,
            commands,
            interval,
            drain_limit: drain_limit.max(1),
            running_status: GameStatus::Started,
            queue_closed: false,
            stats: TickStats::default(),
        }
    }

    /// Status the game state reports while the loop runs.
    pub fn with_running_status(mut self, status: GameStatus) -> Self {
        self.running_status = status;
        self
    }

    /// Counters since the loop was created.
    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// Runs one tick.
    ///
    /// Drains up to `drain_limit` commands that are already queued, without
    /// waiting for more, and applies them in arrival order under a single
    /// write lock. Bullets then advance and the tick counter goes up by one.
    /// A queue whose senders are all gone puts the game into `Error`.
    pub async fn step(&mut self) {
        let pending = self.take_pending(self.drain_limit);

        let state = Arc::clone(&self.state);
        let mut state = state.write().await;
        if self.queue_closed {
            state.set_status(GameStatus::Error);
        }

        for command in pending {
            self.apply(&mut state, command);
        }

        state.advance_bullets();
        state.advance_tick();
        self.stats.ticks += 1;
    }

    /// Applies every command still queued without advancing the world.
    ///
    /// Runs once on the way out so that `Leave`s queued by closing
    /// connections reach the registry before the loop reports it has stopped.
    async fn drain_remaining(&mut self) {
        let pending = self.take_pending(usize::MAX);
        if pending.is_empty() {
            return;
        }

        debug!("Applying {} commands queued before stop", pending.len());
        let state = Arc::clone(&self.state);
        let mut state = state.write().await;
        for command in pending {
            self.apply(&mut state, command);
        }
    }

    fn take_pending(&mut self, limit: usize) -> Vec<Command> {
        let mut pending = Vec::new();
        while pending.len() < limit {
            match self.commands.try_recv() {
                Ok(command) => pending.push(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.queue_closed {
                        error!("Action queue closed while the tick loop is running");
                        self.queue_closed = true;
                    }
                    break;
                }
            }
        }
        pending
    }

    fn apply(&mut self, state: &mut GameState, command: Command) {
        match command {
            Command::Join { connection, reply } => {
                let player = state.register_player();
                if reply.send(player).is_err() {
                    // the handler is already gone, nobody will ever control this player
                    warn!("{} closed before joining, dropping player {}", connection, player);
                    state.remove_player(player);
                }
                self.stats.applied += 1;
            }
            Command::Leave { player } => {
                state.remove_player(player);
                self.stats.applied += 1;
            }
            Command::Apply { player, action } => match state.apply_action(player, action) {
                Ok(outcome) => {
                    debug!("Player {} {:?} -> {:?}", player, action, outcome);
                    self.stats.applied += 1;
                }
                Err(e) => {
                    warn!("Skipping {:?}: {}", action, e);
                    self.stats.rejected += 1;
                }
            },
        }
    }

    /// Ticks at the configured interval until `stop` flips to true or its
    /// sender goes away.
    ///
    /// Sets the running status after the first tick. On the way out, commands
    /// still queued are applied without another tick, then the status goes
    /// back to `Idle` (unless the queue broke and it is `Error`). No state is
    /// mutated once this returns.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> TickStats {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick fires immediately
        timer.tick().await;

        self.state.write().await.set_status(self.running_status);
        info!("Tick loop started ({:?} per tick)", self.interval);

        loop {
            if *stop.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = timer.tick() => {
                    self.step().await;

                    if self.stats.ticks % 60 == 0 {
                        let players = self.state.read().await.player_count();
                        debug!(
                            "Tick {}: {} players, {} commands applied, {} rejected",
                            self.stats.ticks, players, self.stats.applied, self.stats.rejected
                        );
                    }
                }
            }
        }

        self.drain_remaining().await;

        {
            let mut state = self.state.write().await;
            if state.status() != GameStatus::Error {
                state.set_status(GameStatus::Idle);
            }
        }

        info!(
            "Tick loop stopped after {} ticks ({} commands applied, {} rejected)",
            self.stats.ticks, self.stats.applied, self.stats.rejected
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PlayerIdAllocator;
    use tokio::time::{sleep, timeout};

    fn setup(capacity: usize) -> (Arc<RwLock<GameState>>, mpsc::Sender<Command>, TickLoop) {
        let state = Arc::new(RwLock::new(GameState::new(
            1,
            Arc::new(PlayerIdAllocator::new()),
        )));
        let (tx, rx) = mpsc::channel(capacity);
        let tick_loop = TickLoop::new(Arc::clone(&state), rx, Duration::from_millis(16), capacity);
        (state, tx, tick_loop)
    }

    async fn join(tx: &mpsc::Sender<Command>, tick_loop: &mut TickLoop) -> PlayerId {
        let (reply, rx) = oneshot::channel();
        tx.send(Command::Join {
            connection: ConnectionId(1),
            reply,
        })
        .await
        .unwrap();
        tick_loop.step().await;
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_move_down_applied_within_one_tick() {
        let (state, tx, mut tick_loop) = setup(16);
        let player = join(&tx, &mut tick_loop).await;
        state.write().await.player_mut(player).unwrap().update_position(50);

        tx.send(Command::Apply {
            player,
            action: Action::MoveDown,
        })
        .await
        .unwrap();
        tick_loop.step().await;

        assert_eq!(state.read().await.player(player).unwrap().position.y, 60);
    }

    #[tokio::test]
    async fn test_actions_applied_in_arrival_order() {
        let (state, tx, mut tick_loop) = setup(16);
        let player = join(&tx, &mut tick_loop).await;

        for action in [Action::MoveDown, Action::MoveDown, Action::MoveUp, Action::MoveDown] {
            tx.send(Command::Apply { player, action }).await.unwrap();
        }
        tick_loop.step().await;

        assert_eq!(state.read().await.player(player).unwrap().position.y, 20);
        assert_eq!(tick_loop.stats().applied, 5);
    }

    #[tokio::test]
    async fn test_unknown_player_skipped_without_stopping() {
        let (state, tx, mut tick_loop) = setup(16);
        let player = join(&tx, &mut tick_loop).await;

        tx.send(Command::Apply {
            player: 999,
            action: Action::Fire,
        })
        .await
        .unwrap();
        tx.send(Command::Apply {
            player,
            action: Action::MoveDown,
        })
        .await
        .unwrap();
        tick_loop.step().await;

        let state = state.read().await;
        assert_eq!(state.player(player).unwrap().position.y, 10);
        assert!(state.bullets().is_empty());
        assert_eq!(tick_loop.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_drain_is_bounded() {
        let (state, tx, mut tick_loop) = setup(4);
        let player = join(&tx, &mut tick_loop).await;

        let mut tick_loop = TickLoop {
            drain_limit: 2,
            ..tick_loop
        };
        for _ in 0..4 {
            tx.send(Command::Apply {
                player,
                action: Action::MoveDown,
            })
            .await
            .unwrap();
        }

        tick_loop.step().await;
        assert_eq!(state.read().await.player(player).unwrap().position.y, 20);

        tick_loop.step().await;
        assert_eq!(state.read().await.player(player).unwrap().position.y, 40);
    }

    #[tokio::test]
    async fn test_step_on_empty_queue_advances_tick() {
        let (state, _tx, mut tick_loop) = setup(4);

        tick_loop.step().await;
        tick_loop.step().await;

        assert_eq!(state.read().await.tick(), 2);
    }

    #[tokio::test]
    async fn test_join_for_vanished_handler_is_undone() {
        let (state, tx, mut tick_loop) = setup(4);
        let (reply, rx) = oneshot::channel();
        drop(rx);

        tx.send(Command::Join {
            connection: ConnectionId(3),
            reply,
        })
        .await
        .unwrap();
        tick_loop.step().await;

        assert_eq!(state.read().await.player_count(), 0);
    }

    #[tokio::test]
    async fn test_leave_removes_player() {
        let (state, tx, mut tick_loop) = setup(4);
        let player = join(&tx, &mut tick_loop).await;

        tx.send(Command::Leave { player }).await.unwrap();
        tick_loop.step().await;

        assert_eq!(state.read().await.player_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_queue_marks_error() {
        let (state, tx, mut tick_loop) = setup(4);
        drop(tx);

        tick_loop.step().await;
        assert_eq!(state.read().await.status(), GameStatus::Error);
    }

    #[tokio::test]
    async fn test_run_stops_and_freezes_state() {
        let (state, _tx, tick_loop) = setup(4);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(tick_loop.with_running_status(GameStatus::Testing).run(stop_rx));

        sleep(Duration::from_millis(100)).await;
        assert_eq!(state.read().await.status(), GameStatus::Testing);

        stop_tx.send(true).unwrap();
        let stats = timeout(Duration::from_secs(1), handle)
            .await
            .expect("tick loop did not stop")
            .unwrap();
        assert!(stats.ticks > 0);

        let frozen = state.read().await.tick();
        assert_eq!(frozen, stats.ticks);
        assert_eq!(state.read().await.status(), GameStatus::Idle);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(state.read().await.tick(), frozen);
    }

    #[tokio::test]
    async fn test_run_applies_queued_leaves_before_stopping() {
        let (state, tx, mut tick_loop) = setup(8);
        let first = join(&tx, &mut tick_loop).await;
        let second = join(&tx, &mut tick_loop).await;
        let ticks_before = state.read().await.tick();

        tx.send(Command::Leave { player: first }).await.unwrap();
        tx.send(Command::Leave { player: second }).await.unwrap();

        let (stop_tx, stop_rx) = watch::channel(true);
        let stats = timeout(Duration::from_secs(1), tick_loop.run(stop_rx))
            .await
            .expect("tick loop did not stop");
        drop(stop_tx);

        let state = state.read().await;
        assert_eq!(state.player_count(), 0);
        assert_eq!(state.tick(), ticks_before);
        assert_eq!(stats.applied, 4);
        assert_eq!(state.status(), GameStatus::Idle);
    }
}
