use clap::Parser;
use client::network::Client;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Controls messages sent per second
    #[arg(short = 'i', long, default_value = "10")]
    input_rate: u32,

    /// Leave after this many snapshots
    #[arg(short = 'n', long)]
    snapshots: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let input_interval = Duration::from_secs_f32(1.0 / args.input_rate.max(1) as f32);
    let mut client = Client::connect(&args.server, input_interval).await?;

    client.run(args.snapshots).await?;

    let state = client.game_state();
    info!(
        "Done after {} snapshots, best length {}",
        state.snapshots_received(),
        state.best_length()
    );

    Ok(())
}
