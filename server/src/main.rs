use clap::Parser;
use log::{error, info};
use server::config::{ServerConfig, DEFAULT_ADDR, MAX_CONNECTIONS};
use server::network::Server;
use server::shutdown::ShutdownHandle;
use std::net::SocketAddr;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    addr: SocketAddr,

    /// Milliseconds between two ticks of the game loop
    #[arg(short, long, default_value = "16")]
    tick_ms: u64,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value_t = MAX_CONNECTIONS)]
    max_connections: usize,

    /// Game state version tag
    #[arg(long, default_value = "1")]
    game_version: u8,

    /// Run the game state in testing mode
    #[arg(long)]
    testing: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        bind_addr: args.addr,
        tick_interval: Duration::from_millis(args.tick_ms.max(1)),
        max_connections: args.max_connections,
        version: args.game_version,
        testing: args.testing,
        ..ServerConfig::default()
    };

    let server = Server::bind(config).await?;
    tokio::spawn(stop_on_signal(server.shutdown_handle()));

    if let Err(e) = server.run().await {
        error!("Server stopped with an error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

async fn stop_on_signal(shutdown: ShutdownHandle) {
    wait_for_signal().await;
    info!("Received stop signal, shutting down gracefully...");
    shutdown.shutdown();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!("Could not listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for ctrl-c: {}", e);
    }
}
