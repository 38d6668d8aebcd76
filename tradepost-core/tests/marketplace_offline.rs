//! The whole lifecycle against ports that fail every side effect

use std::sync::Arc;

use tempfile::TempDir;
use tradepost_core::{
    Detached, Ladder, Marketplace, Mode, NewListing, OfferStatus, Platform, Region, TradeConfig,
    TradeError,
};

async fn offline(temp: &TempDir) -> Marketplace {
    let config = TradeConfig {
        data_dir: temp.path().to_path_buf(),
        ..TradeConfig::default()
    };
    Marketplace::open(&config, Arc::new(Detached), Arc::new(Detached))
        .await
        .unwrap()
}

fn grief() -> NewListing {
    NewListing {
        owner_id: "U1".into(),
        item: "Grief".into(),
        wanted_in_return: "Enigma".into(),
        mode: Some(Mode::Hardcore),
        ladder: Some(Ladder::Ladder),
        platforms: vec![Platform::Pc, Platform::PlayStation],
        region: Some(Region::Asia),
        ..Default::default()
    }
}

#[tokio::test]
async fn lifecycle_survives_failed_side_effects() {
    let temp = TempDir::new().unwrap();
    let market = offline(&temp).await;

    let rows = market.listings.create_listing(grief()).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.origin_message_ref.is_none()));

    let offer = market.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();
    assert_eq!(offer.private_channel_ref, None);

    market.offers.accept(offer.offer_id, "U1").await.unwrap();
    let archived = market.offers.archive(offer.offer_id, "U1").await.unwrap();
    assert_eq!(archived.status, OfferStatus::Archived);

    assert!(market.store().load_trades().await.unwrap().is_empty());
    assert!(market.store().load_offers().await.unwrap().is_empty());
}

#[tokio::test]
async fn state_persists_across_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let market = offline(&temp).await;
        market.listings.create_listing(grief()).await.unwrap();
        market.listings.create_listing(grief()).await.unwrap();
        market.listings.remove_by_index(2).await.unwrap();
    }

    let market = offline(&temp).await;
    let rows = market.listings.create_listing(grief()).await.unwrap();
    // index 2 is never handed out again
    assert_eq!(rows[0].index, 3);

    assert!(matches!(
        market.listings.remove_by_index(2).await,
        Err(TradeError::NotFound { .. })
    ));
}
