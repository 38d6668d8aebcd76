//! Offer lifecycle manager
//!
//! ```text
//!            accept              archive
//! Pending ─────────► Accepted ─────────► Archived
//!    │  ▲                ▲
//!    │  │ accept-counter │
//!    │  └──────────┐     │
//!    │ counter     │     │
//!    ├──────► CounterOffered ──► Declined (decline-counter)
//!    ├──────► Declined (decline)
//!    └──────► Retracted (retract, also from CounterOffered)
//! ```
//!
//! The seller accepts, declines, counters and archives; the buyer retracts
//! and answers a counter. Authorization is checked before status, and every
//! rejected call leaves storage untouched. Notifications never roll back a
//! committed transition.
//!
//! Archiving deletes the offer record last, so an archive that fails part
//! way leaves the offer `Accepted` and can simply be retried.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::error::{Result, TradeError};
use crate::format::{format_offer_line, mention};
use crate::interaction::ActionId;
use crate::listings::ListingManager;
use crate::model::{Offer, OfferAction, OfferStatus, TradeListing};
use crate::ports::{log_side_effect, Announcement, Announcer, ChannelRef, ChannelResolver};
use crate::store::RecordStore;
use crate::validation::{non_empty, optional_text, ValidationError};

/// Longest accepted offer or counter-offer text
pub const MAX_TERMS_LEN: usize = 1000;

fn terms(field: &'static str, raw: &str) -> std::result::Result<String, ValidationError> {
    let value = non_empty(field, raw)?;
    if value.chars().count() > MAX_TERMS_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_TERMS_LEN,
        });
    }
    Ok(value)
}

/// Reject `actor` unless they are the party `action` belongs to.
fn authorize(offer: &Offer, actor: &str, action: OfferAction) -> Result<()> {
    let party = action.actor();
    if offer.party_id(party) != actor {
        return Err(TradeError::forbidden(format!(
            "only the {} can {} offer {}",
            party,
            action.verb(),
            offer.offer_id
        )));
    }
    Ok(())
}

/// Status `offer` moves to when `actor` performs `action`.
fn next_status(offer: &Offer, actor: &str, action: OfferAction) -> Result<OfferStatus> {
    authorize(offer, actor, action)?;
    offer
        .status
        .after(action)
        .ok_or_else(|| TradeError::invalid_state(offer.offer_id, offer.status, action.verb()))
}

#[derive(Clone)]
pub struct OfferManager {
    store: Arc<RecordStore>,
    announcer: Arc<dyn Announcer>,
    channels: Arc<dyn ChannelResolver>,
    listings: ListingManager,
}

impl OfferManager {
    pub fn new(
        store: Arc<RecordStore>,
        announcer: Arc<dyn Announcer>,
        channels: Arc<dyn ChannelResolver>,
        listings: ListingManager,
    ) -> Self {
        Self {
            store,
            announcer,
            channels,
            listings,
        }
    }

    /// Record a buyer's offer against a listing and announce it to both
    /// parties.
    ///
    /// The private conversation of an earlier offer by the same buyer on the
    /// same listing is reused; otherwise one is opened once the offer is
    /// saved. When no conversation can be provided the seller is notified
    /// directly instead.
    #[instrument(skip(self, proposed_terms, notes))]
    pub async fn submit_offer(
        &self,
        trade_index: u64,
        buyer_id: &str,
        proposed_terms: &str,
        notes: Option<&str>,
    ) -> Result<Offer> {
        let buyer_id = non_empty("buyer", buyer_id)?;
        let proposed_terms = terms("offer", proposed_terms)?;
        let notes = optional_text(notes);

        let listing = self.open_listing(trade_index).await?;
        if listing.owner_id == buyer_id {
            return Err(TradeError::forbidden("sellers cannot make offers on their own listing"));
        }

        let created_at = Utc::now();
        let seller_id = listing.owner_id.clone();
        let mut offer = self
            .store
            .update_offers(move |c| {
                let private_channel_ref = c
                    .records
                    .iter()
                    .filter(|o| {
                        o.trade_index == trade_index
                            && o.seller_id == seller_id
                            && o.buyer_id == buyer_id
                    })
                    .find_map(|o| o.private_channel_ref.clone());
                let offer = Offer {
                    offer_id: c.allocate_id(),
                    trade_index,
                    seller_id,
                    buyer_id,
                    proposed_terms,
                    notes,
                    status: OfferStatus::Pending,
                    counter_terms: None,
                    created_at,
                    private_channel_ref,
                };
                c.records.push(offer.clone());
                Ok(offer)
            })
            .await?;

        // the listing may have been removed while the offer was being saved
        if let Err(e) = self.open_listing(trade_index).await {
            let offer_id = offer.offer_id;
            self.store
                .update_offers(move |c| {
                    c.records.retain(|o| o.offer_id != offer_id);
                    Ok(())
                })
                .await?;
            return Err(e);
        }

        if offer.private_channel_ref.is_none() {
            let context = offer.private_context(&listing.item);
            if let Some(channel) = log_side_effect(self.channels.open_private(&context).await) {
                offer = self.attach_private_channel(offer, channel).await;
            }
        }

        tracing::info!(
            offer_id = offer.offer_id,
            trade_index,
            seller = %offer.seller_id,
            buyer = %offer.buyer_id,
            "offer submitted"
        );

        let content = format!(
            "{} — {} has made an offer on your {}\n\n{}",
            mention(&offer.seller_id),
            mention(&offer.buyer_id),
            listing.item,
            format_offer_line(&offer)
        );
        match &offer.private_channel_ref {
            Some(channel) => {
                let announcement = Announcement {
                    mentions: vec![offer.seller_id.clone(), offer.buyer_id.clone()],
                    content,
                    actions: [
                        OfferAction::Accept,
                        OfferAction::Decline,
                        OfferAction::Counter,
                        OfferAction::Retract,
                    ]
                    .into_iter()
                    .map(|a| ActionId::new(a, offer.offer_id))
                    .collect(),
                };
                log_side_effect(
                    self.announcer
                        .post(&ChannelRef::new(channel.clone()), &announcement)
                        .await,
                );
            }
            None => {
                log_side_effect(self.announcer.direct_message(&offer.seller_id, &content).await);
            }
        }

        Ok(offer)
    }

    /// First row of the listing at `trade_index`.
    async fn open_listing(&self, trade_index: u64) -> Result<TradeListing> {
        self.store
            .load_trades()
            .await?
            .into_iter()
            .find(|t| t.index == trade_index)
            .ok_or_else(|| TradeError::not_found("trade listing", trade_index))
    }

    /// Record a freshly opened private conversation on the offer. If that
    /// cannot be saved the conversation is closed again and the offer is
    /// returned without one.
    async fn attach_private_channel(&self, offer: Offer, channel: ChannelRef) -> Offer {
        let offer_id = offer.offer_id;
        let reference = channel.0.clone();
        let saved = self
            .store
            .update_offers(move |c| {
                let stored = c
                    .records
                    .iter_mut()
                    .find(|o| o.offer_id == offer_id)
                    .ok_or_else(|| TradeError::not_found("offer", offer_id))?;
                stored.private_channel_ref = Some(reference);
                Ok(stored.clone())
            })
            .await;

        match saved {
            Ok(offer) => offer,
            Err(e) => {
                tracing::warn!(offer_id, error = %e, "private conversation not recorded, closing it");
                log_side_effect(self.channels.close_private(&channel).await);
                offer
            }
        }
    }

    /// Apply `action` under the offers lock. `amend` runs after the checks
    /// and may reject the change.
    async fn transition<F>(
        &self,
        offer_id: u64,
        actor: &str,
        action: OfferAction,
        amend: F,
    ) -> Result<Offer>
    where
        F: FnOnce(&mut Offer) -> Result<()> + Send,
    {
        let actor = actor.to_owned();
        let offer = self
            .store
            .update_offers(move |c| {
                let offer = c
                    .records
                    .iter_mut()
                    .find(|o| o.offer_id == offer_id)
                    .ok_or_else(|| TradeError::not_found("offer", offer_id))?;

                let next = next_status(offer, &actor, action)?;
                amend(offer)?;
                offer.status = next;
                Ok(offer.clone())
            })
            .await?;

        tracing::info!(offer_id, action = action.slug(), status = %offer.status, "offer updated");
        Ok(offer)
    }

    /// Post a follow-up in the offer's private conversation, if it has one.
    async fn follow_up(&self, offer: &Offer, content: String, actions: &[OfferAction]) {
        let Some(channel) = &offer.private_channel_ref else {
            return;
        };
        let announcement = Announcement {
            mentions: Vec::new(),
            content,
            actions: actions
                .iter()
                .map(|a| ActionId::new(*a, offer.offer_id))
                .collect(),
        };
        log_side_effect(
            self.announcer
                .post(&ChannelRef::new(channel.clone()), &announcement)
                .await,
        );
    }

    async fn notify(&self, user_id: &str, text: &str) {
        log_side_effect(self.announcer.direct_message(user_id, text).await);
    }

    /// Seller accepts a pending offer.
    #[instrument(skip(self))]
    pub async fn accept(&self, offer_id: u64, actor: &str) -> Result<Offer> {
        let offer = self
            .transition(offer_id, actor, OfferAction::Accept, |_| Ok(()))
            .await?;
        self.notify(
            &offer.buyer_id,
            &format!(
                "Your offer on trade listing {} has been accepted! You may now chat with the seller. Once finished, the seller can archive the chat.",
                offer.trade_index
            ),
        )
        .await;
        self.follow_up(&offer, format!("Offer {} accepted.", offer.offer_id), &[OfferAction::Archive])
            .await;
        Ok(offer)
    }

    /// Seller declines a pending offer.
    #[instrument(skip(self))]
    pub async fn decline(&self, offer_id: u64, actor: &str) -> Result<Offer> {
        let offer = self
            .transition(offer_id, actor, OfferAction::Decline, |_| Ok(()))
            .await?;
        self.notify(
            &offer.buyer_id,
            &format!("Your offer on trade listing {} has been declined.", offer.trade_index),
        )
        .await;
        Ok(offer)
    }

    /// Buyer withdraws a pending or countered offer.
    #[instrument(skip(self))]
    pub async fn retract(&self, offer_id: u64, actor: &str) -> Result<Offer> {
        let offer = self
            .transition(offer_id, actor, OfferAction::Retract, |_| Ok(()))
            .await?;
        self.notify(
            &offer.seller_id,
            &format!(
                "The offer on trade listing {} has been retracted by the buyer.",
                offer.trade_index
            ),
        )
        .await;
        Ok(offer)
    }

    /// Seller answers a pending offer with different terms.
    #[instrument(skip(self, counter_terms))]
    pub async fn counter(&self, offer_id: u64, actor: &str, counter_terms: &str) -> Result<Offer> {
        let counter_terms = counter_terms.to_owned();
        let offer = self
            .transition(offer_id, actor, OfferAction::Counter, move |offer| {
                offer.counter_terms = Some(terms("counter offer", &counter_terms)?);
                Ok(())
            })
            .await?;

        let text = format!(
            "A counteroffer has been made for trade listing {}:\n{}",
            offer.trade_index,
            offer.counter_terms.as_deref().unwrap_or_default()
        );
        self.notify(&offer.buyer_id, &text).await;
        self.follow_up(
            &offer,
            text,
            &[
                OfferAction::AcceptCounter,
                OfferAction::DeclineCounter,
                OfferAction::Retract,
            ],
        )
        .await;
        Ok(offer)
    }

    /// Buyer takes the seller's counter terms.
    #[instrument(skip(self))]
    pub async fn accept_counter(&self, offer_id: u64, actor: &str) -> Result<Offer> {
        let offer = self
            .transition(offer_id, actor, OfferAction::AcceptCounter, |_| Ok(()))
            .await?;
        self.notify(
            &offer.seller_id,
            &format!(
                "The buyer accepted your counteroffer on trade listing {}. Once finished, you can archive the chat.",
                offer.trade_index
            ),
        )
        .await;
        self.follow_up(
            &offer,
            format!("Counteroffer on offer {} accepted.", offer.offer_id),
            &[OfferAction::Archive],
        )
        .await;
        Ok(offer)
    }

    /// Buyer turns down the seller's counter terms.
    #[instrument(skip(self))]
    pub async fn decline_counter(&self, offer_id: u64, actor: &str) -> Result<Offer> {
        let offer = self
            .transition(offer_id, actor, OfferAction::DeclineCounter, |_| Ok(()))
            .await?;
        self.notify(
            &offer.seller_id,
            &format!(
                "The buyer declined your counteroffer on trade listing {}.",
                offer.trade_index
            ),
        )
        .await;
        Ok(offer)
    }

    /// Seller closes an accepted trade.
    ///
    /// Every listing row with the offer's index is removed along with its
    /// announcements, the summary is refreshed, the private conversation is
    /// closed and finally the offer record itself is deleted. The returned
    /// offer is the final `Archived` state.
    #[instrument(skip(self))]
    pub async fn archive(&self, offer_id: u64, actor: &str) -> Result<Offer> {
        let offer = self.ensure_allowed(offer_id, actor, OfferAction::Archive).await?;

        let removed = self.listings.discard(offer.trade_index).await?;
        tracing::info!(offer_id, trade_index = offer.trade_index, rows = removed.len(), "listing closed");

        if let Some(channel) = &offer.private_channel_ref {
            log_side_effect(self.channels.close_private(&ChannelRef::new(channel.clone())).await);
        }

        let actor = actor.to_owned();
        let offer = self
            .store
            .update_offers(move |c| {
                let position = c
                    .records
                    .iter()
                    .position(|o| o.offer_id == offer_id)
                    .ok_or_else(|| TradeError::not_found("offer", offer_id))?;
                let next = next_status(&c.records[position], &actor, OfferAction::Archive)?;
                let mut offer = c.records.remove(position);
                offer.status = next;
                Ok(offer)
            })
            .await?;
        tracing::info!(offer_id, action = OfferAction::Archive.slug(), status = %offer.status, "offer updated");

        self.notify(
            &offer.buyer_id,
            &format!(
                "The chat for trade listing {} has been archived by the seller.",
                offer.trade_index
            ),
        )
        .await;
        Ok(offer)
    }

    /// Dispatch `action` by value. `Counter` requires `counter_terms`.
    pub async fn perform(
        &self,
        action: OfferAction,
        offer_id: u64,
        actor: &str,
        counter_terms: Option<&str>,
    ) -> Result<Offer> {
        match action {
            OfferAction::Accept => self.accept(offer_id, actor).await,
            OfferAction::Decline => self.decline(offer_id, actor).await,
            OfferAction::Retract => self.retract(offer_id, actor).await,
            OfferAction::Counter => {
                self.counter(offer_id, actor, counter_terms.unwrap_or_default())
                    .await
            }
            OfferAction::Archive => self.archive(offer_id, actor).await,
            OfferAction::AcceptCounter => self.accept_counter(offer_id, actor).await,
            OfferAction::DeclineCounter => self.decline_counter(offer_id, actor).await,
        }
    }

    /// Check that `actor` could perform `action` right now without changing
    /// anything. Used before asking for counter terms.
    pub async fn ensure_allowed(&self, offer_id: u64, actor: &str, action: OfferAction) -> Result<Offer> {
        let offer = self.get(offer_id).await?;
        next_status(&offer, actor, action)?;
        Ok(offer)
    }

    pub async fn get(&self, offer_id: u64) -> Result<Offer> {
        self.store
            .load_offers()
            .await?
            .into_iter()
            .find(|o| o.offer_id == offer_id)
            .ok_or_else(|| TradeError::not_found("offer", offer_id))
    }

    /// Offers made against one listing, in storage order
    pub async fn offers_for_listing(&self, trade_index: u64) -> Result<Vec<Offer>> {
        Ok(self
            .store
            .load_offers()
            .await?
            .into_iter()
            .filter(|o| o.trade_index == trade_index)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ladder, Mode, NewListing, Platform, Region};
    use crate::ports::testing::{Event, Recorder};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        recorder: Arc<Recorder>,
        listings: ListingManager,
        offers: OfferManager,
    }

    async fn fixture_with(recorder: Recorder) -> Fixture {
        let temp = TempDir::new().unwrap();
        let recorder = Arc::new(recorder);
        let store = Arc::new(RecordStore::open(temp.path()).await.unwrap());
        let listings = ListingManager::new(store.clone(), recorder.clone(), recorder.clone());
        let offers = OfferManager::new(store, recorder.clone(), recorder.clone(), listings.clone());
        Fixture {
            _temp: temp,
            recorder,
            listings,
            offers,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Recorder::default()).await
    }

    async fn list_grief(f: &Fixture, platforms: Vec<Platform>) -> u64 {
        let rows = f
            .listings
            .create_listing(NewListing {
                owner_id: "U1".into(),
                item: "Grief".into(),
                wanted_in_return: "Enigma".into(),
                mode: Some(Mode::Hardcore),
                ladder: Some(Ladder::Ladder),
                platforms,
                region: Some(Region::Americas),
                ..Default::default()
            })
            .await
            .unwrap();
        rows[0].index
    }

    #[tokio::test]
    async fn grief_for_enigma_end_to_end() {
        let f = fixture().await;
        let index = list_grief(&f, vec![Platform::Pc]).await;
        assert_eq!(index, 1);

        let offer = f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();
        assert_eq!(offer.offer_id, 1);
        assert_eq!(offer.status, OfferStatus::Pending);
        assert_eq!(offer.seller_id, "U1");
        assert_eq!(offer.private_channel_ref.as_deref(), Some("U1-1-Grief/u2-offer"));

        let accepted = f.offers.accept(1, "U1").await.unwrap();
        assert_eq!(accepted.status, OfferStatus::Accepted);

        let archived = f.offers.archive(1, "U1").await.unwrap();
        assert_eq!(archived.status, OfferStatus::Archived);

        let store = f.listings.store();
        assert!(store.load_offers().await.unwrap().iter().all(|o| o.offer_id != 1));
        assert!(store.load_trades().await.unwrap().iter().all(|t| t.index != 1));

        // an archived offer is gone for every later action
        for result in [
            f.offers.accept(1, "U1").await,
            f.offers.decline(1, "U1").await,
            f.offers.retract(1, "U2").await,
            f.offers.counter(1, "U1", "Ber").await,
        ] {
            assert!(matches!(result, Err(TradeError::NotFound { resource: "offer", .. })));
        }

        let events = f.recorder.events();
        assert!(events.contains(&Event::ClosePrivate(ChannelRef::new("U1-1-Grief/u2-offer"))));
        assert!(events.iter().any(|e| matches!(e, Event::Delete(_))));
        assert_eq!(f.recorder.summaries().last().map(String::as_str), Some(""));
        assert!(f.recorder.directs_to("U2").iter().any(|m| m.contains("archived")));
    }

    #[tokio::test]
    async fn offer_announcement_carries_actions() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", Some("can add Ist")).await.unwrap();

        let posted = f
            .recorder
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Post(channel, a) if channel.as_str() == "U1-1-Grief/u2-offer" => Some(a),
                _ => None,
            })
            .next()
            .unwrap();
        assert_eq!(posted.mentions, vec!["U1".to_string(), "U2".to_string()]);
        assert_eq!(
            posted.actions.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
            vec!["offerAccept:1", "offerDecline:1", "offerCounter:1", "offerRetract:1"]
        );
        assert!(posted.content.contains("**Notes:** can add Ist"));
    }

    #[tokio::test]
    async fn retract_by_non_buyer_is_forbidden() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();

        let err = f.offers.retract(1, "U3").await.unwrap_err();
        assert!(matches!(err, TradeError::Forbidden { .. }));
        assert_eq!(f.offers.get(1).await.unwrap().status, OfferStatus::Pending);

        // the seller is not the buyer either
        assert!(matches!(
            f.offers.retract(1, "U1").await,
            Err(TradeError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn offer_on_unknown_listing_is_not_found() {
        let f = fixture().await;
        let err = f.offers.submit_offer(42, "U2", "BOTD", None).await.unwrap_err();
        assert!(matches!(err, TradeError::NotFound { resource: "trade listing", .. }));
        assert!(f.listings.store().load_offers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seller_cannot_offer_on_own_listing() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        assert!(matches!(
            f.offers.submit_offer(1, "U1", "BOTD", None).await,
            Err(TradeError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn second_accept_is_invalid_state() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();
        f.offers.accept(1, "U1").await.unwrap();

        let err = f.offers.accept(1, "U1").await.unwrap_err();
        assert!(matches!(
            err,
            TradeError::InvalidState {
                offer_id: 1,
                status: OfferStatus::Accepted,
                ..
            }
        ));
        assert_eq!(f.offers.get(1).await.unwrap().status, OfferStatus::Accepted);
    }

    #[tokio::test]
    async fn archive_can_be_retried_after_a_storage_failure() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();
        f.offers.accept(1, "U1").await.unwrap();

        let trades_path = f.listings.store().trades_path().to_path_buf();
        let saved = std::fs::read_to_string(&trades_path).unwrap();
        std::fs::write(&trades_path, r#"{"version": 99, "nextId": 2, "records": []}"#).unwrap();

        assert!(matches!(
            f.offers.archive(1, "U1").await,
            Err(TradeError::Storage { .. })
        ));
        assert_eq!(f.offers.get(1).await.unwrap().status, OfferStatus::Accepted);

        std::fs::write(&trades_path, saved).unwrap();
        let archived = f.offers.archive(1, "U1").await.unwrap();
        assert_eq!(archived.status, OfferStatus::Archived);
        assert!(f.listings.store().load_offers().await.unwrap().is_empty());
        assert!(f.listings.store().load_trades().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn archive_is_only_for_accepted_offers() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();

        assert!(matches!(
            f.offers.archive(1, "U1").await,
            Err(TradeError::InvalidState { .. })
        ));
        assert_eq!(f.offers.get(1).await.unwrap().status, OfferStatus::Pending);
        assert_eq!(f.listings.store().load_trades().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_offer_save_opens_no_conversation() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;

        let offers_path = f.listings.store().trades_path().with_file_name("offers.json");
        std::fs::write(&offers_path, r#"{"version": 99, "nextId": 1, "records": []}"#).unwrap();

        assert!(matches!(
            f.offers.submit_offer(1, "U2", "BOTD", None).await,
            Err(TradeError::Storage { .. })
        ));
        assert!(!f
            .recorder
            .events()
            .iter()
            .any(|e| matches!(e, Event::OpenPrivate(_))));
    }

    #[tokio::test]
    async fn authorization_is_checked_before_state() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();
        f.offers.decline(1, "U1").await.unwrap();

        // a stranger learns nothing about the status
        assert!(matches!(
            f.offers.accept(1, "U9").await,
            Err(TradeError::Forbidden { .. })
        ));
        assert!(matches!(
            f.offers.accept(1, "U1").await,
            Err(TradeError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn counter_then_accept_counter() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();

        assert!(matches!(
            f.offers.counter(1, "U1", "   ").await,
            Err(TradeError::Validation(ValidationError::Empty { .. }))
        ));
        assert_eq!(f.offers.get(1).await.unwrap().status, OfferStatus::Pending);

        let countered = f.offers.counter(1, "U1", "BOTD + Ber").await.unwrap();
        assert_eq!(countered.status, OfferStatus::CounterOffered);
        assert_eq!(countered.counter_terms.as_deref(), Some("BOTD + Ber"));
        assert!(f.recorder.directs_to("U2").iter().any(|m| m.ends_with("BOTD + Ber")));

        // only the buyer answers a counter
        assert!(matches!(
            f.offers.accept_counter(1, "U1").await,
            Err(TradeError::Forbidden { .. })
        ));
        let accepted = f.offers.accept_counter(1, "U2").await.unwrap();
        assert_eq!(accepted.status, OfferStatus::Accepted);

        f.offers.archive(1, "U1").await.unwrap();
        assert!(f.listings.store().load_trades().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn decline_counter_and_retract_after_counter() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();
        f.offers.submit_offer(1, "U3", "Ist", None).await.unwrap();

        f.offers.counter(1, "U1", "more").await.unwrap();
        let declined = f.offers.decline_counter(1, "U2").await.unwrap();
        assert_eq!(declined.status, OfferStatus::Declined);

        f.offers.counter(2, "U1", "more").await.unwrap();
        let retracted = f.offers.retract(2, "U3").await.unwrap();
        assert_eq!(retracted.status, OfferStatus::Retracted);

        assert_eq!(f.offers.offers_for_listing(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_notification_keeps_the_transition() {
        let f = fixture_with(Recorder {
            fail_direct_messages: true,
            ..Default::default()
        })
        .await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();

        let offer = f.offers.decline(1, "U1").await.unwrap();
        assert_eq!(offer.status, OfferStatus::Declined);
        assert_eq!(f.offers.get(1).await.unwrap().status, OfferStatus::Declined);
    }

    #[tokio::test]
    async fn repeat_offers_reuse_the_private_conversation() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;

        let first = f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();
        f.offers.retract(1, "U2").await.unwrap();
        let second = f.offers.submit_offer(1, "U2", "BOTD + Ist", None).await.unwrap();

        assert_eq!(second.offer_id, 2);
        assert_eq!(first.private_channel_ref, second.private_channel_ref);
        let opened = f
            .recorder
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::OpenPrivate(_)))
            .count();
        assert_eq!(opened, 1);
    }

    #[tokio::test]
    async fn offer_ids_survive_archive() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        list_grief(&f, vec![Platform::Xbox]).await;

        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();
        f.offers.submit_offer(2, "U2", "BOTD", None).await.unwrap();
        f.offers.accept(2, "U1").await.unwrap();
        f.offers.archive(2, "U1").await.unwrap();

        let next = f.offers.submit_offer(1, "U3", "Ist", None).await.unwrap();
        assert_eq!(next.offer_id, 3);
    }

    #[tokio::test]
    async fn perform_dispatches_by_action() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();

        assert!(matches!(
            f.offers.perform(OfferAction::Counter, 1, "U1", None).await,
            Err(TradeError::Validation(_))
        ));
        let offer = f
            .offers
            .perform(OfferAction::Counter, 1, "U1", Some("Ber"))
            .await
            .unwrap();
        assert_eq!(offer.status, OfferStatus::CounterOffered);
    }

    #[tokio::test]
    async fn ensure_allowed_leaves_the_offer_alone() {
        let f = fixture().await;
        list_grief(&f, vec![Platform::Pc]).await;
        f.offers.submit_offer(1, "U2", "BOTD", None).await.unwrap();

        let offer = f.offers.ensure_allowed(1, "U1", OfferAction::Counter).await.unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);
        assert!(matches!(
            f.offers.ensure_allowed(1, "U2", OfferAction::Counter).await,
            Err(TradeError::Forbidden { .. })
        ));

        f.offers.accept(1, "U1").await.unwrap();
        assert!(matches!(
            f.offers.ensure_allowed(1, "U1", OfferAction::Counter).await,
            Err(TradeError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_offer_is_not_found() {
        let f = fixture().await;
        assert!(matches!(
            f.offers.accept(7, "U1").await,
            Err(TradeError::NotFound { resource: "offer", .. })
        ));
        assert!(f.offers.get(7).await.is_err());
    }
}
