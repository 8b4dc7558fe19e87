use clap::Parser;
use log::info;
use server::{Server, ServerConfig};
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// Seconds without any connected player before the server exits
    #[clap(long, default_value = "120")]
    idle_timeout: u64,
    /// Length of each minigame in seconds
    #[clap(long, default_value = "60")]
    minigame_duration: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            tick_rate: args.tick_rate,
            idle_timeout: Duration::from_secs(args.idle_timeout),
            minigame_duration: Duration::from_secs(args.minigame_duration),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::from(Args::parse());
    info!(
        "Starting party server on {} at {}Hz",
        config.address(),
        config.tick_rate
    );

    let server = Server::bind(&config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
