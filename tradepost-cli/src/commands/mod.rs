//! Command implementations for the tradepost CLI

use std::sync::Arc;

use anyhow::{Context, Result};
use tradepost_core::{Detached, Marketplace, TradeConfig};

pub mod listings;
pub mod offers;
#[cfg(feature = "server")]
pub mod serve;
pub mod summary;

pub use listings::run_listings;
pub use offers::run_offers;
#[cfg(feature = "server")]
pub use serve::run_serve;
pub use summary::run_summary;

/// Open the marketplace without a platform connection. Side effects
/// (announcements, direct messages) are logged as undeliverable.
pub(crate) async fn open_offline(config: &TradeConfig) -> Result<Marketplace> {
    Marketplace::open(config, Arc::new(Detached), Arc::new(Detached))
        .await
        .with_context(|| format!("Failed to open data directory {}", config.data_dir.display()))
}

/// Pretty JSON for `--json` output
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
