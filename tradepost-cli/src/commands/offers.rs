//! Offer inspection

use anyhow::Result;
use clap::{Parser, Subcommand};

use tradepost_core::format::format_offer_line;
use tradepost_core::TradeConfig;

use super::{open_offline, print_json};

#[derive(Parser, Debug)]
pub struct OffersArgs {
    #[command(subcommand)]
    pub command: OffersCommand,
}

#[derive(Subcommand, Debug)]
pub enum OffersCommand {
    /// Show one offer
    Show {
        /// Offer id
        id: u64,
        #[arg(long)]
        json: bool,
    },
    /// Offers made against a listing
    List {
        /// Listing index
        #[arg(long)]
        trade_index: u64,
        #[arg(long)]
        json: bool,
    },
}

pub async fn run_offers(args: OffersArgs, config: TradeConfig) -> Result<()> {
    let market = open_offline(&config).await?;

    match args.command {
        OffersCommand::Show { id, json } => {
            let offer = market.offers.get(id).await?;
            if json {
                return print_json(&offer);
            }
            println!("{}", format_offer_line(&offer));
        }
        OffersCommand::List { trade_index, json } => {
            let offers = market.offers.offers_for_listing(trade_index).await?;
            if json {
                return print_json(&offers);
            }
            if offers.is_empty() {
                println!("No offers on listing #{}.", trade_index);
            }
            for offer in &offers {
                println!("{:>4}  {:<16} {}", offer.offer_id, offer.status.as_str(), offer.proposed_terms);
            }
        }
    }
    Ok(())
}
