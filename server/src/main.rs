use clap::Parser;
use log::info;
use server::network::Server;
use shared::{Clock, GameConfig, MonotonicClock, ScaledClock};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum connected clients across all rooms
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// TOML file with game settings; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Physics ticks per second
    #[arg(short, long)]
    tick_rate: Option<u32>,

    /// Snapshots per second
    #[arg(short, long)]
    broadcast_rate: Option<u32>,

    /// Match length in seconds
    #[arg(long)]
    match_duration: Option<u32>,

    /// Humans needed before a match starts
    #[arg(long)]
    min_participants: Option<usize>,

    /// Run simulation time faster or slower than wall time
    #[arg(long, default_value = "1.0")]
    time_scale: f64,
}

fn load_config(args: &Args) -> Result<GameConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => GameConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => GameConfig::default(),
    };

    if let Some(tick_rate) = args.tick_rate {
        config.tick_rate = tick_rate;
    }
    if let Some(broadcast_rate) = args.broadcast_rate {
        config.broadcast_rate = broadcast_rate;
    }
    if let Some(secs) = args.match_duration {
        config.match_duration_secs = secs;
    }
    if let Some(min) = args.min_participants {
        config.min_participants = min;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = load_config(&args)?;

    let mut clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    if args.time_scale != 1.0 {
        info!("Simulation time scaled by {}", args.time_scale);
        clock = Arc::new(ScaledClock::new(clock, args.time_scale));
    }

    info!(
        "Starting server: {} Hz physics, {} Hz snapshots, {} s matches",
        config.tick_rate, config.broadcast_rate, config.match_duration_secs
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config, args.max_clients, clock).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
