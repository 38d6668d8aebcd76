//! Trade listing manager
//!
//! Creates, queries and removes listings. One logical listing is stored as
//! one row per platform; all rows share the display index. Every mutation
//! republishes the "latest trades" summary.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{Result, TradeError};
use crate::format::{chunk_messages, format_trade_line, MAX_MESSAGE_LEN};
use crate::model::{CategoryKey, NewListing, TradeListing};
use crate::ports::{log_side_effect, Announcement, Announcer, ChannelRef, ChannelResolver, MessageRef};
use crate::projection::{project, DEFAULT_SUMMARY_LIMIT};
use crate::store::RecordStore;
use crate::validation::ValidationError;

/// Which listings a removal applies to. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalFilter {
    pub owner: Option<String>,
    pub index: Option<u64>,
}

impl RemovalFilter {
    pub fn matches(&self, trade: &TradeListing) -> bool {
        self.owner.as_deref().map_or(true, |o| trade.owner_id == o)
            && self.index.map_or(true, |i| trade.index == i)
    }

    fn describe(&self) -> String {
        match (&self.owner, self.index) {
            (Some(owner), Some(index)) => format!("#{} owned by {}", index, owner),
            (Some(owner), None) => format!("owned by {}", owner),
            (None, Some(index)) => format!("#{}", index),
            (None, None) => "<empty filter>".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ListingManager {
    store: Arc<RecordStore>,
    announcer: Arc<dyn Announcer>,
    channels: Arc<dyn ChannelResolver>,
    summary_limit: usize,
}

impl ListingManager {
    pub fn new(
        store: Arc<RecordStore>,
        announcer: Arc<dyn Announcer>,
        channels: Arc<dyn ChannelResolver>,
    ) -> Self {
        Self {
            store,
            announcer,
            channels,
            summary_limit: DEFAULT_SUMMARY_LIMIT,
        }
    }

    pub fn with_summary_limit(mut self, limit: usize) -> Self {
        self.summary_limit = limit;
        self
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Validate and persist a listing, then announce each platform row in its
    /// category channel.
    ///
    /// Announcements are best-effort: a row whose channel cannot be resolved
    /// or whose post fails stays listed without a message reference.
    #[instrument(skip(self, listing), fields(owner = %listing.owner_id))]
    pub async fn create_listing(&self, listing: NewListing) -> Result<Vec<TradeListing>> {
        let created_at = Utc::now();
        let mut rows = self
            .store
            .update_trades(move |c| {
                let index = c.allocate_id();
                let rows = listing.into_rows(index, created_at)?;
                c.records.extend(rows.iter().cloned());
                Ok(rows)
            })
            .await?;

        let index = rows[0].index;
        tracing::info!(index, platforms = rows.len(), "listing created");

        let mut posted = Vec::new();
        for row in &mut rows {
            if let Some(message) = self.announce(row).await {
                row.origin_channel_ref = Some(message.channel.0.clone());
                row.origin_message_ref = Some(message.message_id.clone());
                posted.push((row.platform, message));
            }
        }

        if !posted.is_empty() {
            // the listing may have been removed meanwhile; then nothing matches
            self.store
                .update_trades(move |c| {
                    for trade in c.records.iter_mut().filter(|t| t.index == index) {
                        if let Some((_, message)) = posted.iter().find(|(p, _)| *p == trade.platform) {
                            trade.origin_channel_ref = Some(message.channel.0.clone());
                            trade.origin_message_ref = Some(message.message_id.clone());
                        }
                    }
                    Ok(())
                })
                .await?;
        }

        self.refresh_summary_logged().await;
        Ok(rows)
    }

    async fn announce(&self, row: &TradeListing) -> Option<MessageRef> {
        let channel = log_side_effect(self.channels.category_channel(&row.category()).await)?;
        let announcement = Announcement::text(format_trade_line(row, &[row.platform]));
        log_side_effect(self.announcer.post(&channel, &announcement).await)
    }

    /// Remove every row matching `filter`; NotFound when nothing matches.
    #[instrument(skip(self))]
    pub async fn remove(&self, filter: RemovalFilter) -> Result<Vec<TradeListing>> {
        if filter.owner.is_none() && filter.index.is_none() {
            return Err(ValidationError::Empty {
                field: "owner or index",
            }
            .into());
        }

        let description = filter.describe();
        let removed = self.remove_where(move |t| filter.matches(t)).await?;
        if removed.is_empty() {
            return Err(TradeError::not_found("trade listing", description));
        }
        Ok(removed)
    }

    /// Remove all rows of a listing.
    pub async fn remove_by_index(&self, index: u64) -> Result<Vec<TradeListing>> {
        self.remove(RemovalFilter {
            owner: None,
            index: Some(index),
        })
        .await
    }

    /// Remove an owner's listings, or only the one at `index`.
    pub async fn remove_by_owner_and_optional_index(
        &self,
        owner: &str,
        index: Option<u64>,
    ) -> Result<Vec<TradeListing>> {
        self.remove(RemovalFilter {
            owner: Some(owner.to_owned()),
            index,
        })
        .await
    }

    /// Remove the rows of a listing if any remain. Used when an accepted
    /// offer closes the trade; an already-removed listing is not an error.
    pub(crate) async fn discard(&self, index: u64) -> Result<Vec<TradeListing>> {
        self.remove_where(move |t| t.index == index).await
    }

    async fn remove_where<P>(&self, matches: P) -> Result<Vec<TradeListing>>
    where
        P: Fn(&TradeListing) -> bool + Send,
    {
        let removed = self
            .store
            .update_trades(move |c| {
                let (removed, kept): (Vec<_>, Vec<_>) =
                    std::mem::take(&mut c.records).into_iter().partition(|t| matches(t));
                c.records = kept;
                Ok(removed)
            })
            .await?;

        if removed.is_empty() {
            return Ok(removed);
        }
        tracing::info!(rows = removed.len(), "listing rows removed");

        for trade in &removed {
            if let (Some(channel), Some(message_id)) =
                (&trade.origin_channel_ref, &trade.origin_message_ref)
            {
                let message = MessageRef {
                    channel: ChannelRef::new(channel.clone()),
                    message_id: message_id.clone(),
                };
                log_side_effect(self.announcer.delete(&message).await);
            }
        }

        self.refresh_summary_logged().await;
        Ok(removed)
    }

    /// All rows of one listing
    pub async fn get(&self, index: u64) -> Result<Vec<TradeListing>> {
        let rows: Vec<_> = self
            .store
            .load_trades()
            .await?
            .into_iter()
            .filter(|t| t.index == index)
            .collect();
        if rows.is_empty() {
            return Err(TradeError::not_found("trade listing", index));
        }
        Ok(rows)
    }

    /// Case-insensitive keyword search over item, wanted-in-return and notes,
    /// in storage order.
    pub async fn search(&self, keyword: &str) -> Result<Vec<TradeListing>> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ValidationError::Empty { field: "keyword" }.into());
        }
        Ok(self
            .store
            .load_trades()
            .await?
            .into_iter()
            .filter(|t| t.matches_keyword(&needle))
            .collect())
    }

    /// Rows grouped by category, groups in order of first appearance.
    pub async fn list_grouped_by_category(&self) -> Result<Vec<(CategoryKey, Vec<TradeListing>)>> {
        let mut groups: Vec<(CategoryKey, Vec<TradeListing>)> = Vec::new();
        for trade in self.store.load_trades().await? {
            let key = trade.category();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, rows)) => rows.push(trade),
                None => groups.push((key, vec![trade])),
            }
        }
        Ok(groups)
    }

    /// Direct-message every listing to `user_id`, one header per category.
    /// Returns the number of rows sent.
    #[instrument(skip(self))]
    pub async fn send_overview(&self, user_id: &str) -> Result<usize> {
        let groups = self.list_grouped_by_category().await?;
        let mut sent = 0;
        for (category, rows) in &groups {
            let header = format!("🔹 **{}**", category.to_string().to_uppercase());
            let blocks: Vec<String> = rows
                .iter()
                .map(|t| format_trade_line(t, &[t.platform]))
                .collect();
            self.send_chunks(user_id, Some(&header), &blocks).await;
            sent += rows.len();
        }
        Ok(sent)
    }

    /// Direct-message the search results for `keyword` to `user_id`.
    /// Returns the number of matches.
    #[instrument(skip(self))]
    pub async fn send_search_results(&self, user_id: &str, keyword: &str) -> Result<usize> {
        let matches = self.search(keyword).await?;
        let blocks: Vec<String> = matches
            .iter()
            .map(|t| format_trade_line(t, &[t.platform]))
            .collect();
        self.send_chunks(user_id, None, &blocks).await;
        Ok(matches.len())
    }

    async fn send_chunks(&self, user_id: &str, header: Option<&str>, blocks: &[String]) {
        for chunk in chunk_messages(header, blocks, MAX_MESSAGE_LEN) {
            if log_side_effect(self.announcer.direct_message(user_id, &chunk).await).is_none() {
                break;
            }
        }
    }

    /// Current summary text
    pub async fn summary(&self) -> Result<String> {
        Ok(project(&self.store.load_trades().await?, self.summary_limit))
    }

    /// Recompute the summary and publish it. Publishing is best-effort.
    pub async fn refresh_summary(&self) -> Result<String> {
        let text = self.summary().await?;
        log_side_effect(self.announcer.publish_summary(&text).await);
        Ok(text)
    }

    async fn refresh_summary_logged(&self) {
        if let Err(e) = self.refresh_summary().await {
            tracing::warn!(error = %e, "summary refresh failed");
        }
    }
}
