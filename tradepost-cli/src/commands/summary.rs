//! Latest-trades summary

use anyhow::Result;
use clap::Parser;

use tradepost_core::projection::{project, SUMMARY_TITLE};
use tradepost_core::TradeConfig;

#[derive(Parser, Debug)]
pub struct SummaryArgs {
    /// Entries to include (default: summary_limit from config)
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

pub async fn run_summary(args: SummaryArgs, config: TradeConfig) -> Result<()> {
    let market = super::open_offline(&config).await?;
    let limit = args.limit.unwrap_or(config.summary_limit).max(1);

    let trades = market.store().load_trades().await?;
    println!("{}", SUMMARY_TITLE);
    let text = project(&trades, limit);
    if text.is_empty() {
        println!("\nNo trades yet.");
    } else {
        println!("\n{}", text);
    }
    Ok(())
}
