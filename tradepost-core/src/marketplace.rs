//! Wiring of the managers around one record store

use std::sync::Arc;

use crate::config::TradeConfig;
use crate::error::Result;
use crate::listings::ListingManager;
use crate::offers::OfferManager;
use crate::ports::{Announcer, ChannelResolver};
use crate::store::RecordStore;
use crate::submission::SubmissionBroker;

/// Everything a host dispatcher needs to serve interactions
#[derive(Clone)]
pub struct Marketplace {
    pub listings: ListingManager,
    pub offers: OfferManager,
    pub submissions: SubmissionBroker,
}

impl Marketplace {
    /// Open the store under `config.data_dir` and build the managers around
    /// the given ports.
    pub async fn open(
        config: &TradeConfig,
        announcer: Arc<dyn Announcer>,
        channels: Arc<dyn ChannelResolver>,
    ) -> Result<Self> {
        let store = Arc::new(RecordStore::open(&config.data_dir).await?);
        Ok(Self::with_store(store, config, announcer, channels))
    }

    pub fn with_store(
        store: Arc<RecordStore>,
        config: &TradeConfig,
        announcer: Arc<dyn Announcer>,
        channels: Arc<dyn ChannelResolver>,
    ) -> Self {
        let listings = ListingManager::new(Arc::clone(&store), Arc::clone(&announcer), Arc::clone(&channels))
            .with_summary_limit(config.summary_limit);
        let offers = OfferManager::new(store, announcer, channels, listings.clone());

        Self {
            listings,
            offers,
            submissions: SubmissionBroker::new(),
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        self.listings.store()
    }
}
