//! tradepost CLI - marketplace bot host and moderation tool
//!
//! - `serve` runs the HTTP adapter the platform relay talks to
//! - `listings`, `offers` and `summary` read and moderate the data directory
//!   directly, without a platform connection
//! - `config` manages `~/.tradepost/config.toml`

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use tradepost_core::TradeConfig;

mod commands;
mod config;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "tradepost",
    author,
    version,
    about = "Item-trading marketplace bot: listings, offers and the latest-trades summary",
    long_about = "Host the marketplace behind an HTTP adapter for a chat platform relay, \
                  or inspect and moderate its listings and offers from the shell."
)]
struct Cli {
    /// Config file (default: ~/.tradepost/config.toml)
    #[arg(long, global = true, env = "TRADEPOST_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP adapter for the platform relay
    #[cfg(feature = "server")]
    Serve(commands::serve::ServeArgs),
    /// Inspect, search and remove trade listings
    Listings(commands::listings::ListingsArgs),
    /// Inspect offers
    Offers(commands::offers::OffersArgs),
    /// Print the latest-trades summary
    Summary(commands::summary::SummaryArgs),
    /// Manage tradepost configuration (show, path, init, validate)
    Config(config::ConfigArgs),
}

/// Load `.env` from `~/.tradepost/.env`, then the working directory.
/// Variables already set are never overwritten.
fn load_dotenv() {
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".tradepost/.env"));
    }
    let _ = dotenvy::dotenv();
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let tracing_config = tracing_setup::TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    };
    tracing_setup::init(&tracing_config).ok();

    let result = run(cli).await;
    tracing_setup::shutdown_otel();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    let load = || TradeConfig::load_with(config_path.as_deref());

    match cli.command {
        #[cfg(feature = "server")]
        Commands::Serve(args) => commands::run_serve(args, load()?).await?,
        Commands::Listings(args) => commands::run_listings(args, load()?).await?,
        Commands::Offers(args) => commands::run_offers(args, load()?).await?,
        Commands::Summary(args) => commands::run_summary(args, load()?).await?,
        Commands::Config(args) => config::run_config(args, config_path.as_deref())?,
    }
    Ok(())
}
