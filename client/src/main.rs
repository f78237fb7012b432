use clap::Parser;
use client::controller::RandomWalk;
use client::network::Client;
use log::info;
use shared::{Clock, GameConfig, MonotonicClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// TOML file with the match configuration (must match the server's)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Disconnect after this many seconds
    #[arg(short = 'd', long)]
    duration: Option<u64>,

    /// Seed for the random-walk controller
    #[arg(long)]
    seed: Option<u64>,
}

fn load_config(path: Option<&PathBuf>) -> Result<GameConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => GameConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => GameConfig::default(),
    };
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
    let config = load_config(args.config.as_ref())?;

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let controller = match args.seed {
        Some(seed) => {
            info!("Random walk seeded with {}", seed);
            RandomWalk::seeded(seed)
        }
        None => RandomWalk::new(),
    };
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());

    let mut client = Client::new(&args.server, config, Box::new(controller), clock).await?;

    client.run(args.duration.map(Duration::from_secs)).await?;

    if let Some(reason) = client.rejection() {
        info!("Server ended the session: {}", reason);
    }

    Ok(())
}
