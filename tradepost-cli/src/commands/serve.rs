//! HTTP server command
//!
//! Runs the adapter the platform relay forwards interactions to.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;

use tradepost_core::TradeConfig;
use tradepost_server::{run_server, ServerConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', default_value = "127.0.0.1:3030", env = "TRADEPOST_BIND")]
    pub bind: SocketAddr,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn run_serve(args: ServeArgs, trade_config: TradeConfig) -> Result<()> {
    if trade_config.category_channels.is_empty() {
        tracing::warn!("no [category_channels] configured; listings will not be announced");
    }
    if trade_config.summary_channel.is_none() {
        tracing::warn!("no summary_channel configured; the latest-trades summary will not be published");
    }

    tracing::info!("Starting tradepost server on {}", args.bind);

    let config = ServerConfig {
        bind_addr: args.bind,
        cors_permissive: args.cors_permissive,
    };

    run_server(config, trade_config).await.context("Server error")?;
    Ok(())
}
