use clap::Parser;
use log::info;
use server::network::Server;
use shared::{Game, GameConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments
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
    #[clap(short, long, default_value = "30")]
    tick_rate: u32,
    /// Maximum number of connected clients (at most 255, the snapshot
    /// player count is one byte)
    #[clap(short, long, default_value = "16", value_parser = clap::value_parser!(u8).range(1..))]
    max_clients: u8,
    /// Seconds of silence before a client is dropped
    #[clap(long, default_value = "10")]
    client_timeout: u64,
    /// Random seed, overrides the config file
    #[clap(long)]
    seed: Option<u64>,
    /// Number of apples kept on the map, overrides the config file
    #[clap(long)]
    apples: Option<u32>,
    /// JSON game config
    #[clap(short, long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<GameConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => GameConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => GameConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(apples) = args.apples {
        config.target_apples = apples;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let game = Game::new(config)?;
    info!(
        "Map {}x{}, {} apples, seed {:#x}",
        game.map().width(),
        game.map().height(),
        game.config().target_apples,
        game.config().seed
    );

    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f32(1.0 / args.tick_rate.max(1) as f32);
    let mut server = Server::new(&address, game, tick_duration, usize::from(args.max_clients))
        .await?
        .with_client_timeout(Duration::from_secs(args.client_timeout));

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
