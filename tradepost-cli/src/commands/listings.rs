//! Listing inspection and moderation

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use tradepost_core::format::format_trade_line;
use tradepost_core::{RemovalFilter, TradeConfig, TradeListing};

use super::{open_offline, print_json};

#[derive(Parser, Debug)]
pub struct ListingsArgs {
    #[command(subcommand)]
    pub command: ListingsCommand,
}

#[derive(Subcommand, Debug)]
pub enum ListingsCommand {
    /// List every listing, grouped by category
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keyword search over item, wanted-in-return and notes
    Search {
        /// Case-insensitive keyword
        keyword: String,
        #[arg(long)]
        json: bool,
    },
    /// Show all platform rows of one listing
    Show {
        /// Listing index
        index: u64,
        #[arg(long)]
        json: bool,
    },
    /// Remove listings by index and/or owner (moderation)
    ///
    /// Announcement messages cannot be deleted without a platform
    /// connection. Rows that still have one are refused unless --force is
    /// given; use the server's DELETE /listings to remove them cleanly.
    Remove {
        /// Listing index
        #[arg(long)]
        index: Option<u64>,
        /// Owner user id
        #[arg(long)]
        owner: Option<String>,
        /// Remove even when announcement messages would be left behind
        #[arg(long)]
        force: bool,
    },
}

pub async fn run_listings(args: ListingsArgs, config: TradeConfig) -> Result<()> {
    let market = open_offline(&config).await?;
    let listings = &market.listings;

    match args.command {
        ListingsCommand::List { json } => {
            let groups = listings.list_grouped_by_category().await?;
            if json {
                let rows: Vec<&TradeListing> = groups.iter().flat_map(|(_, rows)| rows).collect();
                return print_json(&rows);
            }
            if groups.is_empty() {
                println!("No listings.");
            }
            for (category, rows) in &groups {
                println!("🔹 {}", category.to_string().to_uppercase());
                print_rows(rows);
            }
        }
        ListingsCommand::Search { keyword, json } => {
            let rows = listings.search(&keyword).await?;
            if json {
                return print_json(&rows);
            }
            if rows.is_empty() {
                println!("No listings match '{}'.", keyword.trim());
            }
            print_rows(&rows);
        }
        ListingsCommand::Show { index, json } => {
            let rows = listings.get(index).await?;
            if json {
                return print_json(&rows);
            }
            let platforms: Vec<_> = rows.iter().map(|r| r.platform).collect();
            println!("{}", format_trade_line(&rows[0], &platforms));
        }
        ListingsCommand::Remove { index, owner, force } => {
            if index.is_none() && owner.is_none() {
                bail!("Specify --index, --owner or both");
            }
            let filter = RemovalFilter { owner, index };

            let announced: Vec<TradeListing> = listings
                .store()
                .load_trades()
                .await?
                .into_iter()
                .filter(|t| filter.matches(t) && t.origin_message_ref.is_some())
                .collect();
            if !announced.is_empty() && !force {
                bail!(
                    "{} matching row(s) still have announcement messages that cannot be deleted offline. \
                     Remove them through the running server (DELETE /listings) or pass --force",
                    announced.len()
                );
            }

            let removed = listings.remove(filter).await?;
            let mut indices: Vec<u64> = removed.iter().map(|r| r.index).collect();
            indices.sort_unstable();
            indices.dedup();
            tracing::info!(rows = removed.len(), "listings removed");
            println!(
                "Removed {} row(s) from listing(s) {}",
                removed.len(),
                indices.iter().map(|i| format!("#{}", i)).collect::<Vec<_>>().join(", ")
            );
            for row in &announced {
                println!(
                    "Announcement left in place: channel {} message {}",
                    row.origin_channel_ref.as_deref().unwrap_or("?"),
                    row.origin_message_ref.as_deref().unwrap_or("?")
                );
            }
        }
    }
    Ok(())
}

fn print_rows(rows: &[TradeListing]) {
    for row in rows {
        println!("{}\n", format_trade_line(row, &[row.platform]));
    }
}
