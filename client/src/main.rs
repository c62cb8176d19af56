use clap::Parser;
use client::bot::{run_bot, BotConfig};
use log::{error, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Number of bots to run side by side
    #[arg(short = 'n', long, default_value = "1")]
    bots: u32,

    /// Actions each bot sends per second
    #[arg(short = 'r', long, default_value = "10")]
    rate: u32,

    /// How long each bot plays, in seconds
    #[arg(short = 'd', long, default_value = "10")]
    duration: u64,

    /// Share of actions that are shots (0.0 - 1.0)
    #[arg(long, default_value = "0.2")]
    fire_ratio: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("Starting {} bots against {}", args.bots, args.server);

    let config = BotConfig {
        server_addr: args.server,
        actions_per_second: args.rate,
        duration: Duration::from_secs(args.duration),
        fire_ratio: args.fire_ratio,
    };

    let mut bots = JoinSet::new();
    for seed in 0..args.bots {
        bots.spawn(run_bot(config.clone(), u64::from(seed)));
    }

    let mut total_actions = 0;
    let mut failed = 0;
    while let Some(joined) = bots.join_next().await {
        match joined {
            Ok(Ok(report)) => total_actions += report.actions_sent,
            Ok(Err(e)) => {
                error!("Bot failed: {}", e);
                failed += 1;
            }
            Err(e) => {
                error!("Bot task panicked: {}", e);
                failed += 1;
            }
        }
    }

    info!(
        "Done: {} actions sent, {} of {} bots failed",
        total_actions, failed, args.bots
    );
    Ok(())
}
