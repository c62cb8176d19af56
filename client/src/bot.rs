//! Scripted players that connect to a server and send random actions.
//! Used for soak testing and for watching the server under load.

use crate::error::ClientError;
use crate::network::GameClient;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{Action, PlayerId};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub server_addr: SocketAddr,
    pub actions_per_second: u32,
    pub duration: Duration,
    /// Share of actions that are `Fire`, the rest are split between moves
    pub fire_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReport {
    pub player_id: PlayerId,
    pub actions_sent: u64,
    /// Tick number of the final snapshot, if the server was still there to ask
    pub final_tick: Option<u64>,
}

pub fn pick_action<R: Rng>(rng: &mut R, fire_ratio: f64) -> Action {
    if rng.gen_bool(fire_ratio.clamp(0.0, 1.0)) {
        Action::Fire
    } else {
        *[Action::MoveUp, Action::MoveDown]
            .choose(rng)
            .unwrap_or(&Action::MoveDown)
    }
}

/// Plays one bot until `config.duration` has passed.
pub async fn run_bot(config: BotConfig, seed: u64) -> Result<BotReport, ClientError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut client = GameClient::connect(config.server_addr).await?;

    let player_id = client.join(pick_action(&mut rng, config.fire_ratio)).await?;
    let mut actions_sent = 1;

    let period = Duration::from_secs(1) / config.actions_per_second.max(1);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = Instant::now() + config.duration;

    while Instant::now() < deadline {
        ticker.tick().await;
        let action = pick_action(&mut rng, config.fire_ratio);
        if let Err(e) = client.send_action(action).await {
            warn!("Bot {} stopped sending: {}", player_id, e);
            return Ok(BotReport {
                player_id,
                actions_sent,
                final_tick: None,
            });
        }
        actions_sent += 1;
    }

    let final_tick = match client.snapshot().await {
        Ok(snapshot) => {
            debug!(
                "Bot {} sees {} players and {} bullets at tick {}",
                player_id,
                snapshot.players.len(),
                snapshot.bullets.len(),
                snapshot.tick
            );
            Some(snapshot.tick)
        }
        Err(e) => {
            warn!("Bot {} could not fetch a final snapshot: {}", player_id, e);
            None
        }
    };

    if let Err(e) = client.close().await {
        debug!("Bot {} close failed: {}", player_id, e);
    }

    info!("Bot {} done after {} actions", player_id, actions_sent);
    Ok(BotReport {
        player_id,
        actions_sent,
        final_tick,
    })
}
